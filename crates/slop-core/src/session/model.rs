//! Core session domain model.

use super::history::ResultHistory;
use super::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// Display name of a session that has not been named yet.
pub const DEFAULT_SESSION_NAME: &str = "New Session";

/// Number of input characters used for a derived session name.
const NAME_PREFIX_CHARS: usize = 30;

/// One user workspace.
///
/// Field names are serialized in camelCase so stored records stay readable by
/// older builds. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier, immutable after creation.
    pub id: String,
    pub created: i64,
    /// Refreshed on every save.
    pub updated: i64,
    /// The raw seed text typed by the user.
    #[serde(default)]
    pub prompt_input: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub result_history: Vec<String>,
    /// Cursor into `result_history`; `-1` when empty.
    #[serde(default = "empty_index")]
    pub current_history_index: i64,
    #[serde(default)]
    pub name: String,
}

fn empty_index() -> i64 {
    -1
}

impl Session {
    /// Creates an empty session stamped with `now_ms`.
    pub fn new(id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            created: now_ms,
            updated: now_ms,
            prompt_input: String::new(),
            chat_history: Vec::new(),
            result_history: Vec::new(),
            current_history_index: -1,
            name: DEFAULT_SESSION_NAME.to_string(),
        }
    }

    /// Returns the result history with its cursor validated.
    pub fn history(&self) -> ResultHistory {
        ResultHistory::from_parts(self.result_history.clone(), self.current_history_index)
    }

    /// Writes `history` back into the persisted fields.
    pub fn set_history(&mut self, history: ResultHistory) {
        let (entries, index) = history.into_parts();
        self.result_history = entries;
        self.current_history_index = index;
    }

    /// Whether the session still carries the default (or no) name.
    pub fn has_default_name(&self) -> bool {
        self.name.is_empty() || self.name == DEFAULT_SESSION_NAME
    }

    /// Derives a display name from the trimmed prompt input.
    ///
    /// Only applies while the name is still default; returns `true` when the
    /// name changed.
    pub(crate) fn derive_name(&mut self) -> bool {
        if !self.has_default_name() {
            return false;
        }

        let trimmed = self.prompt_input.trim();
        if trimmed.is_empty() {
            return false;
        }

        let mut name: String = trimmed.chars().take(NAME_PREFIX_CHARS).collect();
        if trimmed.chars().count() > NAME_PREFIX_CHARS {
            name.push_str("...");
        }
        self.name = name;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_name_truncates_long_input() {
        let mut session = Session::new("s1", 0);
        session.prompt_input = "a".repeat(50);
        assert!(session.derive_name());
        assert_eq!(session.name, format!("{}...", "a".repeat(30)));
    }

    #[test]
    fn test_derive_name_keeps_explicit_name() {
        let mut session = Session::new("s1", 0);
        session.name = "Mine".to_string();
        session.prompt_input = "something".to_string();
        assert!(!session.derive_name());
        assert_eq!(session.name, "Mine");
    }

    #[test]
    fn test_derive_name_ignores_blank_input() {
        let mut session = Session::new("s1", 0);
        session.prompt_input = "   ".to_string();
        assert!(!session.derive_name());
        assert_eq!(session.name, DEFAULT_SESSION_NAME);
    }

    #[test]
    fn test_reads_camel_case_record_with_missing_fields() {
        let json = r#"{"id":"abc","created":1,"updated":2,"promptInput":"hi","currentHistoryIndex":-1}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.prompt_input, "hi");
        assert!(session.result_history.is_empty());
        assert_eq!(session.history().cursor(), None);

        let out = serde_json::to_value(&session).unwrap();
        assert!(out.get("chatHistory").is_some());
        assert!(out.get("resultHistory").is_some());
    }
}
