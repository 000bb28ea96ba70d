//! Session domain module.
//!
//! A session is one user workspace: the seed input, the chat transcript and
//! the history of accepted results.
//!
//! # Module Structure
//!
//! - `model`: Persisted session record (`Session`)
//! - `message`: Transcript message types (`Role`, `ChatMessage`)
//! - `history`: Undo/redo list of accepted results (`ResultHistory`)
//! - `store`: Session persistence over a key-value store (`SessionStore`)

mod history;
mod message;
mod model;
mod store;

pub use history::ResultHistory;
pub use message::{ChatMessage, Role};
pub use model::{DEFAULT_SESSION_NAME, Session};
pub use store::SessionStore;
