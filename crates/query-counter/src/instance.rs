use crate::config::AnalysisConfig;
use crate::stack;
use crate::statement::Statement;
use crate::store::Fingerprint;

/// A stack frame whose source file matched one of the configured heuristic paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeuristicFrame {
    /// Source file of the frame.
    pub filename: String,
    /// Bare name of the enclosing function.
    pub caller: String,
    /// Line number within `filename`.
    pub line_number: u32,
}

/// A distinct statement (and call site, when tracebacks are enabled) with the
/// number of times it was executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInstance {
    /// Formatted stack lines, innermost-first. Empty unless tracebacks are enabled.
    pub stack: Vec<String>,
    /// Number of executions, at least 1.
    pub count: usize,
    /// Canonical statement text.
    pub statement: String,
    /// Frames matching the heuristic paths, innermost-first.
    pub heuristics: Vec<HeuristicFrame>,
    /// Tag of the first execution, if it had one. Not part of the fingerprint.
    pub tag: Option<String>,
}

impl QueryInstance {
    /// Record a single execution without stack data.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            stack: Vec::new(),
            count: 1,
            statement: statement.into(),
            heuristics: Vec::new(),
            tag: None,
        }
    }

    /// Build an instance for one execution notification.
    ///
    /// The call stack is captured at most once and only when tracebacks or
    /// heuristics (with at least one path) are enabled.
    pub fn capture(statement: &dyn Statement, config: &AnalysisConfig) -> Self {
        let mut instance = Self::new(statement.canonical_text().into_owned());
        instance.tag = statement.tag().map(str::to_string);

        if config.needs_stack() {
            let frames = stack::capture();
            if config.traceback_enabled {
                instance.stack = stack::format_stack(&frames);
            }
            if config.wants_heuristics() {
                instance.heuristics = stack::heuristic_frames(&frames, &config.heuristic_paths);
            }
        }

        instance
    }

    /// Attach a pre-rendered stack.
    pub fn with_stack<I, S>(mut self, stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack = stack.into_iter().map(Into::into).collect();
        self
    }

    /// Attach heuristic frames.
    pub fn with_heuristics(mut self, heuristics: Vec<HeuristicFrame>) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// Attach a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Deduplication key: statement text and stack, never heuristics or count.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.statement, &self.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::ExecutedStatement;

    #[test]
    fn capture_without_stack_options_is_text_only() {
        let statement = ExecutedStatement::new("SELECT * FROM users WHERE id = $1");
        let instance = QueryInstance::capture(&statement, &AnalysisConfig::new());

        assert_eq!(instance, QueryInstance::new("SELECT * FROM users WHERE id = $1"));
        assert_eq!(instance.count, 1);
    }

    #[test]
    fn capture_keeps_the_statement_tag() {
        let statement =
            ExecutedStatement::new("SELECT * FROM users WHERE id = $1").with_tag("user_by_id");
        let instance = QueryInstance::capture(&statement, &AnalysisConfig::new());

        assert_eq!(instance.tag.as_deref(), Some("user_by_id"));
        assert_eq!(
            instance.fingerprint(),
            QueryInstance::new("SELECT * FROM users WHERE id = $1").fingerprint()
        );
    }

    #[test]
    fn disabled_heuristics_ignore_paths() {
        let config = AnalysisConfig::new()
            .enable_traceback()
            .with_heuristic_path("query-counter");
        let instance = QueryInstance::capture(&"SELECT 1", &config);

        assert!(!instance.stack.is_empty());
        assert!(instance.heuristics.is_empty());
    }

    #[test]
    fn fingerprint_ignores_heuristics_and_count() {
        let a = QueryInstance::new("SELECT 1");
        let b = QueryInstance {
            count: 7,
            ..QueryInstance::new("SELECT 1").with_heuristics(vec![HeuristicFrame {
                filename: "src/app.rs".to_string(),
                caller: "run".to_string(),
                line_number: 3,
            }])
        };

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), a.clone().with_stack(["x"]).fingerprint());
    }
}
