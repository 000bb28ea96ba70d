//! Prompt templates used by the completion operations.
//!
//! Two providers exist: [`StandardTemplates`] for prompt authoring and
//! [`SkillTemplates`] for multi-file skill bundles. Callers pick one through
//! [`OptimizationMode`]; nothing probes for a provider at runtime.

mod skill;
mod standard;

pub use skill::SkillTemplates;
pub use standard::StandardTemplates;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Identifies one of the templates a completion operation renders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Turns a raw idea into a structured prompt.
    Optimize,
    /// Sets the planning-mode context for a chat turn.
    Chat,
    /// Used for chat when no original prompt or result exists yet.
    ChatFallback,
    /// Refines the current result using the chat transcript.
    Refine,
    /// Refines the current result against the original idea only.
    RefineNoChat,
}

impl PromptKind {
    /// Key under which a user override of this template is persisted.
    ///
    /// The fallback chat block cannot be overridden.
    pub fn override_key(self) -> Option<String> {
        match self {
            PromptKind::ChatFallback => None,
            kind => Some(format!("slop_prompt_{}", kind.as_ref())),
        }
    }
}

/// Output flavour requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    /// Single markdown prompt with YAML frontmatter.
    #[default]
    Prompts,
    /// Multi-file skill bundle.
    Skills,
}

/// Supplies template text for each [`PromptKind`].
pub trait TemplateProvider: Send + Sync {
    /// Returns the template text for `kind`.
    fn template(&self, kind: PromptKind) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_override_keys_match_storage_layout() {
        assert_eq!(PromptKind::Optimize.override_key().as_deref(), Some("slop_prompt_optimize"));
        assert_eq!(PromptKind::Chat.override_key().as_deref(), Some("slop_prompt_chat"));
        assert_eq!(PromptKind::Refine.override_key().as_deref(), Some("slop_prompt_refine"));
        assert_eq!(
            PromptKind::RefineNoChat.override_key().as_deref(),
            Some("slop_prompt_refine_no_chat")
        );
        assert_eq!(PromptKind::ChatFallback.override_key(), None);
    }

    #[test]
    fn test_mode_parses_from_stored_value() {
        assert_eq!(OptimizationMode::from_str("skills").unwrap(), OptimizationMode::Skills);
        assert_eq!(OptimizationMode::from_str("prompts").unwrap(), OptimizationMode::Prompts);
        assert!(OptimizationMode::from_str("other").is_err());
        assert_eq!(OptimizationMode::Skills.as_ref(), "skills");
    }
}
