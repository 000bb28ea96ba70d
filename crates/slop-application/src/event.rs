//! Events the orchestrator sends to the user interface.

use serde::Serialize;
use slop_core::session::{ChatMessage, Session};
use strum::{AsRefStr, Display};

/// Shown in an empty chat panel.
pub const CHAT_INTRO_NOTICE: &str = "Optimize your prompt first, then chat here to refine it!";
/// Shown after a successful refine cleared the chat.
pub const CHAT_REFINED_NOTICE: &str = "Prompt refined. Chat reset for fresh context.";
/// Placeholder for a chat reply cancelled before any text arrived.
pub const CANCELLED_REPLY: &str = "[Cancelled]";

/// The kind of streaming request in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StreamKind {
    Optimize,
    Refine,
    Chat,
}

/// One change the user interface should reflect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// A session became current; redraw input, chat and output from it.
    SessionLoaded { session: Session },
    /// A stream started (`active`) or ended.
    LoadingChanged { kind: StreamKind, active: bool },
    /// Full text of the output panel (throttled while streaming).
    OutputRendered { text: String },
    /// Cursor and length of the result history.
    HistoryChanged { position: Option<usize>, len: usize },
    ChatMessageAdded { message: ChatMessage },
    /// Text of the assistant reply received so far (throttled).
    ChatProgress { text: String },
    /// Final state of an assistant reply.
    ChatReplyFinished { text: String, cancelled: bool },
    /// The chat transcript was cleared.
    ChatReset { notice: String },
    /// A streaming request failed; `message` is ready for display.
    Error { kind: StreamKind, message: String },
}
