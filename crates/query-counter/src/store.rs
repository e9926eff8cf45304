//! Aggregation of query instances by fingerprint.

use crate::instance::QueryInstance;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Content hash of a statement and its stack.
///
/// `SHA-256(SHA-256(statement) || SHA-256(stack lines joined by '\n'))`.
/// Stable across runs; collisions are accepted as negligible and not guarded
/// against.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint a statement text and its stack lines.
    pub fn of(statement: &str, stack: &[String]) -> Self {
        let statement_digest = Sha256::digest(statement.as_bytes());
        let stack_digest = Sha256::digest(stack.join("\n").as_bytes());

        let mut hasher = Sha256::new();
        hasher.update(statement_digest);
        hasher.update(stack_digest);
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Counted query instances in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct QueryStore {
    entries: Vec<QueryInstance>,
    index: HashMap<Fingerprint, usize>,
}

impl QueryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an instance.
    ///
    /// A matching entry has its count bumped by one and keeps its original
    /// stack, heuristics and tag; the new instance is dropped. Returns `true`
    /// when the instance opened a new entry.
    pub fn insert(&mut self, instance: QueryInstance) -> bool {
        let key = instance.fingerprint();
        match self.index.get(&key) {
            Some(&slot) => {
                self.entries[slot].count += 1;
                false
            }
            None => {
                tracing::debug!(
                    target: "query_counter",
                    fingerprint = %key,
                    sql = %instance.statement,
                    tag = instance.tag.as_deref().unwrap_or(""),
                    "new query fingerprint"
                );
                self.index.insert(key, self.entries.len());
                self.entries.push(instance);
                true
            }
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Look up an entry by fingerprint.
    pub fn get(&self, key: &Fingerprint) -> Option<&QueryInstance> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[QueryInstance] {
        &self.entries
    }

    /// Iterate entries in first-seen order.
    pub fn iter(&self) -> std::slice::Iter<'_, QueryInstance> {
        self.entries.iter()
    }

    /// Number of distinct fingerprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a QueryStore {
    type Item = &'a QueryInstance;
    type IntoIter = std::slice::Iter<'a, QueryInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
