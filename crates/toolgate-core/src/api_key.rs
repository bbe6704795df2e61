//! Caller API key registry
//!
//! Static set of opaque caller credentials loaded at startup. Read-only for
//! the lifetime of the process.

use std::collections::HashSet;
use std::fmt;

/// Immutable set of accepted caller keys
#[derive(Clone, Default)]
pub struct ApiKeyRegistry {
    keys: HashSet<String>,
}

impl ApiKeyRegistry {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact-match membership test
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// Keys are credentials; never print them.
impl fmt::Debug for ApiKeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRegistry")
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .finish()
    }
}
