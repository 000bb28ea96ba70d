//! Placeholder substitution for prompt templates.
//!
//! Templates contain `{{ key }}` placeholders (whitespace inside the braces is
//! optional). Keys are substituted longest-first so that a short key which is
//! a substring of a longer one (`prompt` vs `originalPrompt`) can never match
//! inside the longer placeholder.

use regex::{NoExpand, Regex};
use std::collections::HashMap;

/// Substitutes every `{{ key }}` in `template` with its value.
///
/// # Arguments
///
/// * `template` - The template text; `None` renders to an empty string
/// * `values` - Placeholder values; a key mapped to `None` is replaced by `fallback`
/// * `fallback` - Replacement used for keys that are present but unset
///
/// Placeholders whose key is absent from `values` pass through untouched.
pub fn render(template: Option<&str>, values: &HashMap<&str, Option<&str>>, fallback: &str) -> String {
    let Some(template) = template else {
        return String::new();
    };

    let mut keys: Vec<&str> = values.keys().copied().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut result = template.to_string();
    for key in keys {
        let pattern = format!(r"\{{\{{\s*{}\s*\}}\}}", regex::escape(key));
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!("[Template] Skipping placeholder '{}': {}", key, e);
                continue;
            }
        };

        let replacement = values.get(key).copied().flatten().unwrap_or(fallback);
        result = regex.replace_all(&result, NoExpand(replacement)).into_owned();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<'a>(pairs: &[(&'a str, Option<&'a str>)]) -> HashMap<&'a str, Option<&'a str>> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let rendered = render(
            Some("Hello {{name}}, {{name}}!"),
            &values(&[("name", Some("Sam"))]),
            "",
        );
        assert_eq!(rendered, "Hello Sam, Sam!");
    }

    #[test]
    fn test_allows_whitespace_inside_braces() {
        let rendered = render(
            Some("<p>{{ originalPrompt }}</p><q>{{originalPrompt   }}</q>"),
            &values(&[("originalPrompt", Some("idea"))]),
            "",
        );
        assert_eq!(rendered, "<p>idea</p><q>idea</q>");
    }

    #[test]
    fn test_longest_key_wins() {
        let rendered = render(
            Some("{{promptId}}"),
            &values(&[("prompt", Some("X")), ("promptId", Some("Y"))]),
            "",
        );
        assert_eq!(rendered, "Y");
    }

    #[test]
    fn test_unknown_placeholders_pass_through() {
        let rendered = render(
            Some("{{known}} and {{unknownKey}}"),
            &values(&[("known", Some("k"))]),
            "",
        );
        assert_eq!(rendered, "k and {{unknownKey}}");
    }

    #[test]
    fn test_unset_value_uses_fallback() {
        let rendered = render(
            Some("[{{missing}}]"),
            &values(&[("missing", None)]),
            "n/a",
        );
        assert_eq!(rendered, "[n/a]");
    }

    #[test]
    fn test_none_template_renders_empty() {
        assert_eq!(render(None, &values(&[("a", Some("b"))]), "x"), "");
    }

    #[test]
    fn test_regex_metacharacters_in_keys_are_literal() {
        let rendered = render(
            Some("{{a.b}} {{axb}}"),
            &values(&[("a.b", Some("dot"))]),
            "",
        );
        assert_eq!(rendered, "dot {{axb}}");
    }

    #[test]
    fn test_replacement_text_is_not_expanded() {
        let rendered = render(Some("{{cost}}"), &values(&[("cost", Some("$1 and ${2}"))]), "");
        assert_eq!(rendered, "$1 and ${2}");
    }
}
