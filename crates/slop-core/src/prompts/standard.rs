use super::{PromptKind, TemplateProvider};
use std::collections::HashMap;

const OPTIMIZE: &str = include_str!("../../templates/optimize.md");
const CHAT: &str = include_str!("../../templates/chat.md");
const CHAT_FALLBACK: &str = include_str!("../../templates/chat_fallback.md");
const REFINE: &str = include_str!("../../templates/refine.md");
const REFINE_NO_CHAT: &str = include_str!("../../templates/refine_no_chat.md");

/// Prompt-authoring templates with optional user overrides.
///
/// An override replaces the built-in text for its kind; removing it restores
/// the default.
#[derive(Debug, Clone, Default)]
pub struct StandardTemplates {
    overrides: HashMap<PromptKind, String>,
}

impl StandardTemplates {
    /// Creates a provider that only serves the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider with the given overrides applied.
    pub fn with_overrides(overrides: HashMap<PromptKind, String>) -> Self {
        Self { overrides }
    }

    /// Returns the built-in text for `kind`.
    pub fn default_template(kind: PromptKind) -> &'static str {
        match kind {
            PromptKind::Optimize => OPTIMIZE,
            PromptKind::Chat => CHAT,
            PromptKind::ChatFallback => CHAT_FALLBACK,
            PromptKind::Refine => REFINE,
            PromptKind::RefineNoChat => REFINE_NO_CHAT,
        }
    }

    /// Sets or clears the override for `kind`.
    pub fn set_override(&mut self, kind: PromptKind, template: Option<String>) {
        match template {
            Some(text) => {
                self.overrides.insert(kind, text);
            }
            None => {
                self.overrides.remove(&kind);
            }
        }
    }

    /// Returns true if `kind` currently uses a user override.
    pub fn is_overridden(&self, kind: PromptKind) -> bool {
        self.overrides.contains_key(&kind)
    }
}

impl TemplateProvider for StandardTemplates {
    fn template(&self, kind: PromptKind) -> String {
        self.overrides
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Self::default_template(kind).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_expected_placeholders() {
        let templates = StandardTemplates::new();
        assert!(templates.template(PromptKind::Optimize).contains("{{originalPrompt}}"));
        let chat = templates.template(PromptKind::Chat);
        assert!(chat.contains("{{originalPrompt}}"));
        assert!(chat.contains("{{optimizedResult}}"));
        let refine = templates.template(PromptKind::Refine);
        assert!(refine.contains("{{currentResult}}"));
        assert!(refine.contains("{{chatHistory}}"));
        assert!(!templates.template(PromptKind::RefineNoChat).contains("{{chatHistory}}"));
    }

    #[test]
    fn test_override_and_reset() {
        let mut templates = StandardTemplates::new();
        templates.set_override(PromptKind::Optimize, Some("custom {{originalPrompt}}".to_string()));
        assert!(templates.is_overridden(PromptKind::Optimize));
        assert_eq!(templates.template(PromptKind::Optimize), "custom {{originalPrompt}}");

        templates.set_override(PromptKind::Optimize, None);
        assert!(!templates.is_overridden(PromptKind::Optimize));
        assert_eq!(
            templates.template(PromptKind::Optimize),
            StandardTemplates::default_template(PromptKind::Optimize)
        );
    }
}
