use std::time::Duration;

use super::trait_def::{KeyValueStore, StorageError, StorageResult};

/// Storage that refuses every operation, as browsers do when cookies or
/// session storage are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StorageResult<()> {
        Err(StorageError::Unavailable)
    }
}
