#[path = "support/caller_module.rs"]
mod caller_module;

use query_counter::{AnalysisConfig, EventSource, QueryCounter};
use std::sync::Arc;

fn tracked(config: AnalysisConfig) -> (Arc<EventSource>, QueryCounter) {
    let source = Arc::new(EventSource::new());
    let counter = QueryCounter::new(config).with_source(source.clone());
    counter.initialize().unwrap();
    (source, counter)
}

#[test]
fn heuristics_point_at_the_calling_function() {
    let (source, counter) = tracked(
        AnalysisConfig::new()
            .with_alert_threshold(3)
            .enable_heuristics(["caller_module"]),
    );

    caller_module::load_posts_for_each_user(&source, 5);

    let filtered = counter.filtered_queries();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].count, 5);

    let heuristics = &filtered[0].heuristics;
    assert_eq!(heuristics.len(), 1);
    assert_eq!(heuristics[0].caller, "load_posts_for_each_user");
    assert!(heuristics[0].filename.contains("caller_module"));
    assert!(heuristics[0].line_number > 0);
}

#[test]
fn heuristics_without_paths_stay_empty() {
    let (source, counter) = tracked(AnalysisConfig::new().enable_heuristics(Vec::<String>::new()));

    caller_module::load_posts_for_each_user(&source, 2);
    caller_module::load_user(&source);

    assert_eq!(counter.len(), 2);
    assert!(counter.queries().iter().all(|q| q.heuristics.is_empty()));
}

#[test]
fn heuristics_do_not_split_entries() {
    let (source, counter) = tracked(AnalysisConfig::new().enable_heuristics(["provenance"]));

    caller_module::load_user(&source);
    source.dispatch(&"SELECT * FROM users WHERE id = $1");

    assert_eq!(counter.len(), 1);
    assert_eq!(counter.queries()[0].count, 2);
}

#[test]
fn traceback_records_the_calling_code() {
    let (source, counter) = tracked(AnalysisConfig::new().enable_traceback());

    caller_module::load_user(&source);

    let queries = counter.sorted_queries();
    assert_eq!(queries.len(), 1);
    assert!(!queries[0].stack.is_empty());
    assert!(queries[0].stack[0].contains("load_user"));
    assert!(queries[0].heuristics.is_empty());
}

#[test]
fn traceback_separates_call_sites() {
    let (source, counter) = tracked(AnalysisConfig::new().enable_traceback());

    caller_module::load_posts_for_each_user(&source, 3);
    source.dispatch(&"SELECT * FROM posts WHERE user_id = $1");

    let sorted = counter.sorted_queries();
    assert_eq!(sorted.len(), 2);
    assert_eq!(sorted[0].count, 3);
    assert_eq!(sorted[1].count, 1);
}
