//! Storage trait for the local key-value collaborator

use anyhow::Result;

/// A synchronous string-keyed local store.
///
/// Writes overwrite wholesale; there is no partial-write recovery — last
/// write wins. Readers observe a consistent value provided the backend's own
/// write is atomic.
pub trait Storage: Send + Sync {
    /// Get a value, None if absent
    fn get(&self, key: &str) -> Option<String>;

    /// Set a value, overwriting any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value if present
    fn remove(&self, key: &str) -> Result<()>;
}
