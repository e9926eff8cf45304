//! Call-stack capture for query provenance.
//!
//! Frames are reported innermost-first: the first entry is the closest caller
//! outside this crate, the last is the thread entry point. Frames belonging to
//! the unwinder, the `backtrace` crate and this crate are skipped, so the walk
//! starts at the code that issued the statement.

use crate::instance::HeuristicFrame;
use backtrace::Backtrace;

const UNKNOWN: &str = "<unknown>";
const CAPTURE_FN: &str = "query_counter::stack::capture";

/// One resolved stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Source file, `<unknown>` without debug info.
    pub filename: String,
    /// Demangled function path without the trailing hash.
    pub function: String,
    /// Line number, `0` without debug info.
    pub line: u32,
}

impl CapturedFrame {
    /// Render as a single stack line. Addresses are left out so the same call
    /// site always renders the same text.
    pub fn render(&self) -> String {
        format!("{}:{} in {}", self.filename, self.line, self.function)
    }

    /// Bare name of the enclosing function, e.g. `load_posts` for
    /// `app::repo::load_posts::{{closure}}`.
    pub fn caller(&self) -> &str {
        let mut path = self.function.as_str();
        while let Some(stripped) = path.strip_suffix("::{{closure}}") {
            path = stripped;
        }
        path.rsplit("::").next().unwrap_or(path)
    }

    fn to_heuristic(&self) -> HeuristicFrame {
        HeuristicFrame {
            filename: self.filename.clone(),
            caller: self.caller().to_string(),
            line_number: self.line,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Unwinder,
    Internal,
    Caller,
}

/// Capture the current call stack, starting above this crate's frames.
///
/// Everything up to this function's own frame belongs to the unwinder. Returns
/// every frame when that frame cannot be identified (stripped binaries); an
/// empty stack is never an error.
#[inline(never)]
pub fn capture() -> Vec<CapturedFrame> {
    let backtrace = Backtrace::new();

    let mut all = Vec::new();
    let mut callers = Vec::new();
    let mut walk = Walk::Unwinder;

    for symbol in backtrace.frames().iter().flat_map(|frame| frame.symbols()) {
        let frame = CapturedFrame {
            filename: symbol
                .filename()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            function: symbol
                .name()
                .map(|name| format!("{name:#}"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            line: symbol.lineno().unwrap_or(0),
        };

        walk = match walk {
            Walk::Unwinder if frame.function == CAPTURE_FN => Walk::Internal,
            Walk::Internal if !is_internal(&frame.function) => Walk::Caller,
            other => other,
        };
        if walk == Walk::Caller {
            callers.push(frame.clone());
        }
        all.push(frame);
    }

    if walk == Walk::Unwinder { all } else { callers }
}

/// Render frames as stack lines, preserving order.
pub fn format_stack(frames: &[CapturedFrame]) -> Vec<String> {
    frames.iter().map(CapturedFrame::render).collect()
}

/// Frames whose file name contains any of `paths`, innermost-first.
pub fn heuristic_frames(frames: &[CapturedFrame], paths: &[String]) -> Vec<HeuristicFrame> {
    if paths.is_empty() {
        return Vec::new();
    }

    frames
        .iter()
        .filter(|frame| paths.iter().any(|path| frame.filename.contains(path.as_str())))
        .map(CapturedFrame::to_heuristic)
        .collect()
}

fn is_internal(function: &str) -> bool {
    function
        .trim_start_matches('<')
        .starts_with("query_counter::")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(filename: &str, function: &str, line: u32) -> CapturedFrame {
        CapturedFrame {
            filename: filename.to_string(),
            function: function.to_string(),
            line,
        }
    }

    #[test]
    fn caller_strips_path_and_closures() {
        assert_eq!(frame("a.rs", "app::repo::load_posts", 1).caller(), "load_posts");
        assert_eq!(
            frame("a.rs", "app::repo::load_posts::{{closure}}::{{closure}}", 1).caller(),
            "load_posts"
        );
        assert_eq!(
            frame("a.rs", "<app::Repo as app::Load>::load", 1).caller(),
            "load"
        );
        assert_eq!(frame("a.rs", "main", 1).caller(), "main");
    }

    #[test]
    fn heuristic_frames_keep_walk_order() {
        let frames = vec![
            frame("/src/db/pool.rs", "db::pool::run", 10),
            frame("/src/handlers/users.rs", "handlers::users::list", 42),
            frame("/src/main.rs", "main", 3),
            frame("/src/handlers/mod.rs", "handlers::route", 7),
        ];

        let found = heuristic_frames(&frames, &["handlers".to_string()]);
        assert_eq!(
            found,
            vec![
                HeuristicFrame {
                    filename: "/src/handlers/users.rs".to_string(),
                    caller: "list".to_string(),
                    line_number: 42,
                },
                HeuristicFrame {
                    filename: "/src/handlers/mod.rs".to_string(),
                    caller: "route".to_string(),
                    line_number: 7,
                },
            ]
        );
    }

    #[test]
    fn no_paths_means_no_heuristics() {
        let frames = vec![frame("/src/handlers/users.rs", "handlers::users::list", 42)];
        assert!(heuristic_frames(&frames, &[]).is_empty());
    }

    #[test]
    fn internal_frames_are_recognised() {
        assert!(is_internal("query_counter::stack::capture"));
        assert!(is_internal(
            "<query_counter::counter::Recorder as query_counter::events::StatementListener>::on_execute"
        ));
        assert!(!is_internal("my_query_counter::run"));
        assert!(!is_internal("std::rt::lang_start"));
    }

    #[test]
    fn capture_walks_past_the_test_harness() {
        let frames = capture();
        assert!(!frames.is_empty());
        assert_eq!(format_stack(&frames).len(), frames.len());
        assert!(frames.iter().all(|f| !f.function.starts_with("backtrace::")));
        assert!(frames.iter().all(|f| f.function != CAPTURE_FN));
    }

    #[test]
    fn render_has_no_addresses() {
        assert_eq!(
            frame("/src/main.rs", "app::main", 3).render(),
            "/src/main.rs:3 in app::main"
        );
    }
}
