use super::{PromptKind, StandardTemplates, TemplateProvider};

const BEST_PRACTICES: &str = include_str!("../../templates/skill_best_practices.md");
const OPTIMIZE: &str = include_str!("../../templates/skill_optimize.md");
const REFINE: &str = include_str!("../../templates/skill_refine.md");
const REFINE_NO_CHAT: &str = include_str!("../../templates/skill_refine_no_chat.md");

/// Skill-authoring templates.
///
/// Each template embeds the skill best-practices reference in place of its
/// `{{BEST_PRACTICES}}` placeholder. Chat kinds have no skill variant and are
/// served from the standard defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillTemplates;

impl SkillTemplates {
    pub fn new() -> Self {
        Self
    }

    fn with_best_practices(template: &str) -> String {
        template.replace("{{BEST_PRACTICES}}", BEST_PRACTICES)
    }
}

impl TemplateProvider for SkillTemplates {
    fn template(&self, kind: PromptKind) -> String {
        match kind {
            PromptKind::Optimize => Self::with_best_practices(OPTIMIZE),
            PromptKind::Refine => Self::with_best_practices(REFINE),
            PromptKind::RefineNoChat => Self::with_best_practices(REFINE_NO_CHAT),
            PromptKind::Chat | PromptKind::ChatFallback => {
                StandardTemplates::default_template(kind).to_string()
            }
        }
    }
}
