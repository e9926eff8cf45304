//! Threshold analysis over counted queries.
//!
//! Ordering is by count, highest first. Entries with equal counts keep the
//! order in which they were first seen.

use crate::config::AnalysisConfig;
use crate::error::{CounterError, CounterResult};
use crate::instance::QueryInstance;

/// Outcome of a non-failing analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// Nothing exceeded the threshold.
    Clean,
    /// Statements exceeded the threshold and a warning was emitted.
    Warned {
        /// Same text as [`format`].
        report: String,
    },
}

impl Analysis {
    /// Whether nothing exceeded the threshold.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// All entries by count descending, ties in first-seen order.
pub fn sorted(entries: &[QueryInstance]) -> Vec<QueryInstance> {
    ranked(entries).into_iter().cloned().collect()
}

/// Sorted entries executed strictly more often than `threshold`.
pub fn filtered(entries: &[QueryInstance], threshold: usize) -> Vec<QueryInstance> {
    over(entries, threshold).into_iter().cloned().collect()
}

/// One `Count: {count} Query: {statement}` line per filtered entry.
pub fn format(entries: &[QueryInstance], threshold: usize) -> String {
    render(&over(entries, threshold))
}

/// Report entries above the alert threshold.
///
/// Returns [`CounterError::QueryCountExceeded`] when configured to raise,
/// otherwise emits a `tracing` warning and returns [`Analysis::Warned`].
pub fn analyze(entries: &[QueryInstance], config: &AnalysisConfig) -> CounterResult<Analysis> {
    conclude(Exceeded::find(entries, config.alert_threshold), config)
}

/// Report text for the entries above a threshold.
#[derive(Debug)]
pub(crate) struct Exceeded {
    report: String,
    queries: usize,
}

impl Exceeded {
    /// `None` when no entry is above `threshold`.
    pub(crate) fn find(entries: &[QueryInstance], threshold: usize) -> Option<Self> {
        let over = over(entries, threshold);
        if over.is_empty() {
            return None;
        }
        Some(Self {
            report: render(&over),
            queries: over.len(),
        })
    }
}

/// Turn a found (or absent) report into the analysis outcome and log it.
pub(crate) fn conclude(
    exceeded: Option<Exceeded>,
    config: &AnalysisConfig,
) -> CounterResult<Analysis> {
    let Some(Exceeded { report, queries }) = exceeded else {
        if config.log_no_alert {
            tracing::info!(target: "query_counter", "QueryCounter: No queries exceed threshold");
        }
        return Ok(Analysis::Clean);
    };

    if config.raise_if_exceeds {
        return Err(CounterError::exceeded(report));
    }
    tracing::warn!(
        target: "query_counter",
        threshold = config.alert_threshold,
        queries,
        "QueryCounter: Test triggered DB query exceeding alert threshold\n{report}"
    );
    Ok(Analysis::Warned { report })
}

fn ranked(entries: &[QueryInstance]) -> Vec<&QueryInstance> {
    let mut ranked: Vec<_> = entries.iter().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

fn over(entries: &[QueryInstance], threshold: usize) -> Vec<&QueryInstance> {
    let mut over = ranked(entries);
    over.retain(|q| q.count > threshold);
    over
}

fn render(filtered: &[&QueryInstance]) -> String {
    filtered
        .iter()
        .map(|q| format!("Count: {} Query: {}", q.count, q.statement))
        .collect::<Vec<_>>()
        .join("\n")
}
