//! Toolgate Storage Layer
//!
//! Small key/value store for tool context, persisted as a single JSON object
//! file with whole-file atomic replacement on every write.
//!
//! # Usage
//!
//! ```rust,ignore
//! use toolgate_storage::{ContextStore, JsonFileContextStore};
//!
//! let store = JsonFileContextStore::new(Some("/var/lib/toolgate/context.json".into()));
//! store.set("campaign:last", serde_json::json!({"id": 42})).await?;
//! let value = store.get("campaign:last").await?;
//! ```

mod context_store;

pub use context_store::{
    is_valid_key, ContextStore, ContextStoreError, JsonFileContextStore, MAX_KEY_LEN,
};
