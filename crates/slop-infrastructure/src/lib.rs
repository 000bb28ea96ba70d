pub mod file_kv_store;
pub mod paths;
pub mod storage;

pub use crate::file_kv_store::FileKeyValueStore;
pub use crate::paths::SlopPaths;
