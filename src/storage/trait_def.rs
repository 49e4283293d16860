use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String key/value storage as browsers expose it: cookies for visitor state,
/// per-tab session storage for the current session.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored at `key`, `None` when unset or expired
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` at `key`, expiring after `ttl` when given
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()>;
}
