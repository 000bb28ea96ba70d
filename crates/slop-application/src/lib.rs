//! Application layer for SLOP.
//!
//! The [`Orchestrator`] wires user intents to the completion client, the
//! result history and the session store, and reports everything the user
//! should see through a [`UiEvent`] channel.

pub mod error;
pub mod event;
pub mod orchestrator;
pub mod throttle;

pub use error::OrchestratorError;
pub use event::{StreamKind, UiEvent};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use throttle::RenderThrottle;
