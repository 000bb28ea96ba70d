pub mod config;
pub mod error;
pub mod prompts;
pub mod session;
pub mod storage;
pub mod template;

// Re-export common error type
pub use error::SlopError;
