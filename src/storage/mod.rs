pub mod cookie;
pub mod memory;
pub mod trait_def;
pub mod unavailable;

pub use cookie::CookieJar;
pub use memory::{MemoryStore, StoredValue};
pub use trait_def::{KeyValueStore, StorageError, StorageResult};
pub use unavailable::UnavailableStore;
