use std::borrow::Cow;
use std::fmt;

/// A statement observed by the counter.
///
/// Only the canonical text takes part in fingerprinting, so implementations
/// must render the same logical statement identically on every call. For SQL
/// with bound parameters that means the placeholder form (`$1`), never the
/// bound values.
pub trait Statement {
    /// Stable, deterministic text form of the statement.
    fn canonical_text(&self) -> Cow<'_, str>;

    /// Optional name the caller gave this statement. Not part of the
    /// fingerprint.
    fn tag(&self) -> Option<&str> {
        None
    }
}

impl Statement for str {
    fn canonical_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Statement for String {
    fn canonical_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl Statement for Cow<'_, str> {
    fn canonical_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_ref())
    }
}

impl<T: Statement + ?Sized> Statement for &T {
    fn canonical_text(&self) -> Cow<'_, str> {
        (**self).canonical_text()
    }

    fn tag(&self) -> Option<&str> {
        (**self).tag()
    }
}

/// A statement about to be executed by a database client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    /// Canonical SQL used as the counting key.
    pub canonical_sql: String,
    /// Optional query name/tag for identification.
    pub tag: Option<String>,
}

impl ExecutedStatement {
    /// Create an untagged statement.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            canonical_sql: sql.into(),
            tag: None,
        }
    }

    /// Add a tag to identify this statement.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Statement for ExecutedStatement {
    fn canonical_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.canonical_sql)
    }

    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl fmt::Display for ExecutedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_not_part_of_the_text() {
        let plain = ExecutedStatement::new("SELECT * FROM posts WHERE user_id = $1");
        let tagged = plain.clone().with_tag("posts_by_user");

        assert_eq!(plain.canonical_text(), tagged.canonical_text());
        assert_eq!(plain.tag(), None);
        assert_eq!(tagged.tag(), Some("posts_by_user"));
        assert_eq!((&tagged).tag(), Some("posts_by_user"));
    }

    #[test]
    fn plain_strings_are_statements() {
        let owned = String::from("SELECT 1");
        assert_eq!("SELECT 1".canonical_text(), owned.canonical_text());
        assert_eq!((&owned).canonical_text(), "SELECT 1");
        assert_eq!(owned.tag(), None);
    }
}
