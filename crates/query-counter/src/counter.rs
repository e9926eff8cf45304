//! The query counter: listener registration and the public analysis surface.

use crate::analyzer::{self, Analysis};
use crate::config::AnalysisConfig;
use crate::error::{CounterError, CounterResult};
use crate::events::{StatementEvents, StatementListener};
use crate::instance::QueryInstance;
use crate::statement::Statement;
use crate::store::QueryStore;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};


/// The listener registered on the event source.
struct Recorder {
    config: AnalysisConfig,
    store: Mutex<QueryStore>,
}

impl Recorder {
    fn store(&self) -> MutexGuard<'_, QueryStore> {
        // `insert` never leaves the store half-updated, so a poisoned lock is still consistent.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatementListener for Recorder {
    fn on_execute(&self, statement: &dyn Statement) {
        let instance = QueryInstance::capture(statement, &self.config);
        self.store().insert(instance);
    }
}

/// Counts executed statements and reports the ones repeated past a threshold.
///
/// Usage: create a counter with a config and an event source, then either
/// call [`initialize`](Self::initialize) to start a fresh round of tracking,
/// or hold the guard returned by [`enter`](Self::enter) for the duration of
/// the code under test:
///
/// ```ignore
/// let counter = QueryCounter::new(AnalysisConfig::new().with_alert_threshold(0))
///     .with_source(client.events());
/// {
///     let counter = counter.enter()?;
///     client.query("SELECT * FROM users", &[]).await?;
///     counter.analyze()?;
/// }
/// ```
///
/// The store is shared with the registered listener behind a mutex, so the
/// source may notify from several threads at once.
pub struct QueryCounter {
    source: Option<Arc<dyn StatementEvents>>,
    recorder: Arc<Recorder>,
}

impl QueryCounter {
    /// Create an idle counter with no event source.
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            source: None,
            recorder: Arc::new(Recorder {
                config,
                store: Mutex::new(QueryStore::new()),
            }),
        }
    }

    /// Set the event source to listen on.
    pub fn with_source<S: StatementEvents + 'static>(self, source: Arc<S>) -> Self {
        self.with_source_arc(source)
    }

    /// Set the event source from a trait object.
    pub fn with_source_arc(mut self, source: Arc<dyn StatementEvents>) -> Self {
        self.source = Some(source);
        self
    }

    /// The analysis configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.recorder.config
    }

    /// Clear previous results and start tracking.
    ///
    /// Calling this while already tracking keeps the single registration and
    /// only clears the store.
    pub fn initialize(&self) -> CounterResult<()> {
        self.recorder.store().clear();
        self.attach()
    }

    /// Start tracking until the returned guard is dropped.
    ///
    /// Results are not cleared; they stay readable after the scope ends.
    pub fn enter(&self) -> CounterResult<CounterScope<'_>> {
        self.attach()?;
        Ok(CounterScope { counter: self })
    }

    /// Stop tracking. Returns `false` if the counter was not attached.
    pub fn detach(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let removed = source.remove(&self.listener());
        if removed {
            tracing::debug!(target: "query_counter", "listener detached");
        }
        removed
    }

    /// Whether the listener is currently registered.
    pub fn is_tracking(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.contains(&self.listener()))
    }

    /// Count an instance directly, as if it had been observed.
    pub fn insert(&self, instance: QueryInstance) {
        self.recorder.store().insert(instance);
    }

    /// Snapshot of all entries in first-seen order.
    pub fn queries(&self) -> Vec<QueryInstance> {
        self.recorder.store().entries().to_vec()
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.recorder.store().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.recorder.store().is_empty()
    }

    /// Entries by count descending, ties in first-seen order.
    pub fn sorted_queries(&self) -> Vec<QueryInstance> {
        analyzer::sorted(self.recorder.store().entries())
    }

    /// Sorted entries with a count strictly above the alert threshold.
    pub fn filtered_queries(&self) -> Vec<QueryInstance> {
        analyzer::filtered(self.recorder.store().entries(), self.config().alert_threshold)
    }

    /// Report text for the filtered entries, one line each.
    pub fn format(&self) -> String {
        analyzer::format(self.recorder.store().entries(), self.config().alert_threshold)
    }

    /// Warn about, or fail on, entries above the alert threshold.
    ///
    /// Does not modify the recorded entries; calling it repeatedly yields the
    /// same outcome until more statements are observed. The store lock is
    /// released before anything is logged.
    pub fn analyze(&self) -> CounterResult<Analysis> {
        let exceeded =
            analyzer::Exceeded::find(self.recorder.store().entries(), self.config().alert_threshold);
        analyzer::conclude(exceeded, self.config())
    }

    fn listener(&self) -> Arc<dyn StatementListener> {
        self.recorder.clone()
    }

    fn attach(&self) -> CounterResult<()> {
        let source = match &self.source {
            Some(source) if source.is_active() => source,
            _ => return Err(CounterError::MissingSession),
        };

        let listener = self.listener();
        if !source.contains(&listener) {
            source.listen(listener);
            tracing::debug!(
                target: "query_counter",
                threshold = self.config().alert_threshold,
                traceback = self.config().traceback_enabled,
                heuristics = self.config().heuristics_enabled,
                "listener attached"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for QueryCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCounter")
            .field("config", self.config())
            .field("has_source", &self.source.is_some())
            .field("queries", &self.len())
            .finish()
    }
}

/// Tracking scope returned by [`QueryCounter::enter`].
///
/// Detaches the counter when dropped, including during unwinding.
#[must_use = "tracking stops as soon as the scope is dropped"]
#[derive(Debug)]
pub struct CounterScope<'a> {
    counter: &'a QueryCounter,
}

impl CounterScope<'_> {
    /// End the scope explicitly.
    pub fn exit(self) {}
}

impl Deref for CounterScope<'_> {
    type Target = QueryCounter;

    fn deref(&self) -> &QueryCounter {
        self.counter
    }
}

impl Drop for CounterScope<'_> {
    fn drop(&mut self) {
        self.counter.detach();
    }
}
