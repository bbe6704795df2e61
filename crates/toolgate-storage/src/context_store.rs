//! JSON file implementation of the context store.
//!
//! The whole map lives in memory behind a mutex. The backing file is read
//! lazily on first access and rewritten in full (`<path>.tmp` then rename) on
//! every `set`, so readers of the file never observe a partial write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Longest accepted key
pub const MAX_KEY_LEN: usize = 200;

lazy_static! {
    static ref KEY_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_.:/-]{1,200}$").unwrap();
}

/// Check a key against the allowed character set and length.
pub fn is_valid_key(key: &str) -> bool {
    KEY_REGEX.is_match(key)
}

/// Context store errors
#[derive(Debug, Error)]
pub enum ContextStoreError {
    #[error("invalid key")]
    InvalidKey,

    #[error("failed to write context store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize context store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key/value storage for tool context.
///
/// Last writer wins; no other concurrency contract.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Get a value, `None` when the key was never set.
    async fn get(&self, key: &str) -> Result<Option<Value>, ContextStoreError>;

    /// Store a value and return it.
    async fn set(&self, key: &str, value: Value) -> Result<Value, ContextStoreError>;
}

#[derive(Default)]
struct State {
    loaded: bool,
    data: Map<String, Value>,
}

/// Context store persisted to a JSON file, or memory-only without a path.
pub struct JsonFileContextStore {
    path: Option<PathBuf>,
    state: Mutex<State>,
}

impl JsonFileContextStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: Mutex::new(State::default()),
        }
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn ensure_loaded(&self, state: &mut State) {
        if state.loaded {
            return;
        }
        state.loaded = true;

        let Some(path) = &self.path else {
            return;
        };

        // Unreadable or non-object files start fresh
        state.data = match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => {
                    debug!("[ContextStore] Loaded {} keys from {:?}", map.len(), path);
                    map
                }
                Ok(_) => {
                    warn!("[ContextStore] {:?} is not a JSON object, starting empty", path);
                    Map::new()
                }
                Err(e) => {
                    warn!("[ContextStore] Failed to parse {:?}: {}, starting empty", path, e);
                    Map::new()
                }
            },
            Err(e) => {
                debug!("[ContextStore] No readable store at {:?}: {}", path, e);
                Map::new()
            }
        };
    }

    async fn persist(&self, path: &Path, data: &Map<String, Value>) -> Result<(), ContextStoreError> {
        let io_err = |source| ContextStoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl ContextStore for JsonFileContextStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, ContextStoreError> {
        if !is_valid_key(key) {
            return Err(ContextStoreError::InvalidKey);
        }
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        Ok(state.data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<Value, ContextStoreError> {
        if !is_valid_key(key) {
            return Err(ContextStoreError::InvalidKey);
        }
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.data.insert(key.to_string(), value.clone());

        if let Some(path) = &self.path {
            self.persist(path, &state.data).await?;
        }
        Ok(value)
    }
}
