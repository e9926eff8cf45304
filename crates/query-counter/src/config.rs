use serde::Deserialize;

/// Configuration for query analysis.
///
/// Every field has a default, so construction never fails. The config can be
/// built in code or loaded from TOML:
///
/// ```toml
/// alert_threshold = 3
/// raise_if_exceeds = true
/// heuristics_enabled = true
/// heuristic_paths = ["src/handlers"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Statements seen strictly more often than this are reported.
    pub alert_threshold: usize,
    /// Fail `analyze()` instead of emitting a warning.
    pub raise_if_exceeds: bool,
    /// Emit an info event when nothing exceeds the threshold.
    pub log_no_alert: bool,
    /// Capture the full call stack for every statement.
    ///
    /// The stack becomes part of the fingerprint, so the same SQL issued from
    /// two call sites is counted separately.
    pub traceback_enabled: bool,
    /// Record frames whose file matches one of `heuristic_paths`.
    pub heuristics_enabled: bool,
    /// Substrings matched against source file names of captured frames.
    pub heuristic_paths: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 10,
            raise_if_exceeds: false,
            log_no_alert: false,
            traceback_enabled: false,
            heuristics_enabled: false,
            heuristic_paths: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration with defaults (threshold 10, warn only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Set the alert threshold.
    pub fn with_alert_threshold(mut self, threshold: usize) -> Self {
        self.alert_threshold = threshold;
        self
    }

    /// Return an error from `analyze()` when the threshold is exceeded.
    pub fn raise_if_exceeds(mut self) -> Self {
        self.raise_if_exceeds = true;
        self
    }

    /// Log when no statement exceeds the threshold.
    pub fn log_no_alert(mut self) -> Self {
        self.log_no_alert = true;
        self
    }

    /// Capture call stacks for every statement.
    pub fn enable_traceback(mut self) -> Self {
        self.traceback_enabled = true;
        self
    }

    /// Enable heuristic frames, matching file names against `paths`.
    pub fn enable_heuristics<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.heuristics_enabled = true;
        self.heuristic_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Add a single heuristic path.
    pub fn with_heuristic_path(mut self, path: impl Into<String>) -> Self {
        self.heuristic_paths.push(path.into());
        self
    }

    /// Whether a stack capture is needed at all for a notification.
    pub(crate) fn needs_stack(&self) -> bool {
        self.traceback_enabled || self.wants_heuristics()
    }

    pub(crate) fn wants_heuristics(&self) -> bool {
        self.heuristics_enabled && !self.heuristic_paths.is_empty()
    }
}
