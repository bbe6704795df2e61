//! Upstream path allowlists
//!
//! Each upstream target carries an ordered list of path patterns. A pattern is
//! either the wildcard `*`, a prefix pattern ending in `*`, or an exact path.
//! An empty list permits every path: upstreams without a configured
//! restriction stay fully reachable.

/// The wildcard token used in allowlist patterns
pub const WILDCARD: char = '*';

/// A single allowlist entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowlistPattern {
    /// `*` - permits every path
    Any,
    /// `/x*` - permits paths starting with `/x`
    Prefix(String),
    /// `/x` - permits exactly `/x`
    Exact(String),
}

impl AllowlistPattern {
    /// Parse a raw pattern string
    pub fn parse(raw: &str) -> Self {
        if raw.len() == 1 && raw.starts_with(WILDCARD) {
            return Self::Any;
        }
        match raw.strip_suffix(WILDCARD) {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(raw.to_string()),
        }
    }

    /// Check whether this pattern admits `path`
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Exact(exact) => path == exact,
        }
    }
}

/// Check `path` against an ordered pattern set.
///
/// Empty set ⇒ allowed. Otherwise the first matching pattern wins and no
/// match ⇒ rejected.
pub fn matches(path: &str, patterns: &[AllowlistPattern]) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.matches(path))
}

/// Ordered allowlist for one upstream target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    patterns: Vec<AllowlistPattern>,
}

impl Allowlist {
    /// Build from raw pattern strings, in order
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| AllowlistPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// Parse a comma-separated list (`ADS_ALLOWLIST=/api/v1/*,/health`).
    /// Entries are trimmed and blanks dropped.
    pub fn parse_csv(raw: &str) -> Self {
        Self::from_patterns(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Allow-all list
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// True when no restriction is configured (fail-open)
    pub fn is_unrestricted(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[AllowlistPattern] {
        &self.patterns
    }

    /// Check whether the resolved upstream path is permitted
    pub fn permits(&self, path: &str) -> bool {
        matches(path, &self.patterns)
    }
}
