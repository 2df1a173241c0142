/// Message Catalog
///
/// **Core Responsibility:**
/// Store message templates keyed by `(key, locale)` and resolve them with a
/// single fallback key inside the same locale.
///
/// **Critical Properties:**
/// - Overrides are layered on a copy of the defaults, so a key the override
///   does not mention resolves to the default entry
/// - A bare string override replaces only the template; hints and triggers
///   of the entry survive
/// - An empty template is a valid entry and means "stay silent"

use senpai_common::checker::{MessageOverrides, MessagePatch};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEntry {
    pub content: String,
    pub hints: Vec<String>,
    pub triggers: Vec<String>,
}

impl MessageEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = Vec::new();
        for trigger in triggers {
            let trigger = trigger.into();
            if !self.triggers.contains(&trigger) {
                self.triggers.push(trigger);
            }
        }
        self
    }

    fn patch(&mut self, patch: &MessagePatch) {
        match patch {
            MessagePatch::Content(content) => self.content = content.clone(),
            MessagePatch::Entry {
                content,
                hints,
                triggers,
            } => {
                if let Some(content) = content {
                    self.content = content.clone();
                }
                if let Some(hints) = hints {
                    self.hints = hints.clone();
                }
                if let Some(triggers) = triggers {
                    let entry = std::mem::take(self);
                    *self = entry.with_triggers(triggers.iter().cloned());
                }
            }
        }
    }
}

impl From<&str> for MessageEntry {
    fn from(content: &str) -> Self {
        MessageEntry::new(content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    entries: BTreeMap<(String, String), MessageEntry>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, locale: &str, entry: impl Into<MessageEntry>) {
        self.entries
            .insert((key.to_string(), locale.to_string()), entry.into());
    }

    pub fn get(&self, key: &str, locale: &str) -> Option<&MessageEntry> {
        self.entries.get(&(key.to_string(), locale.to_string()))
    }

    /// Look up `key`, then `fallback`, both in `locale`.
    pub fn resolve(&self, key: &str, locale: &str, fallback: Option<&str>) -> Option<&MessageEntry> {
        self.get(key, locale)
            .or_else(|| fallback.and_then(|fb| self.get(fb, locale)))
    }

    /// Apply one override; unknown keys are inserted.
    pub fn patch(&mut self, key: &str, locale: &str, patch: &MessagePatch) {
        self.entries
            .entry((key.to_string(), locale.to_string()))
            .or_default()
            .patch(patch);
    }

    pub fn apply(&mut self, overrides: &MessageOverrides) {
        for (locale, patches) in overrides {
            for (key, patch) in patches {
                self.patch(key, locale, patch);
            }
        }
    }

    /// Copy of this catalog with `overrides` layered on top.
    pub fn with_overrides(&self, overrides: &MessageOverrides) -> Self {
        let mut layered = self.clone();
        layered.apply(overrides);
        layered
    }

    pub fn keys(&self, locale: &str) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|(_, l)| l == locale)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Named values interpolated into templates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatArgs {
    values: BTreeMap<String, String>,
}

impl FormatArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Interpolate `{name}` placeholders; `{{` and `}}` are literal braces.
///
/// A format spec after a colon (`{value:>4}`) is ignored. Placeholders
/// without a value are left as written.
pub fn render(template: &str, args: &FormatArgs) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '{' => match template[idx + 1..].find('}') {
                Some(len) => {
                    let inner = &template[idx + 1..idx + 1 + len];
                    let name = inner.split(':').next().unwrap_or(inner);
                    match args.get(name) {
                        Some(value) if is_placeholder(name) => out.push_str(value),
                        _ => out.push_str(&template[idx..idx + len + 2]),
                    }
                    while let Some((i, _)) = chars.peek() {
                        if *i > idx + 1 + len {
                            break;
                        }
                        chars.next();
                    }
                }
                None => out.push('{'),
            },
            other => out.push(other),
        }
    }
    out
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_catalog() -> MessageCatalog {
        let mut catalog = MessageCatalog::new();
        catalog.set("IncorrectResult", "en", "Wrong result.");
        catalog.set(
            "CorrectResult",
            "en",
            MessageEntry::new("Correct!").with_hints(["keep going"]),
        );
        catalog.set("IncorrectResult", "fi", "Väärä tulos.");
        catalog
    }

    #[test]
    fn test_resolve_prefers_key_then_fallback() {
        let catalog = make_catalog();
        assert_eq!(
            catalog.resolve("IncorrectResult", "en", None).unwrap().content,
            "Wrong result."
        );
        assert_eq!(
            catalog
                .resolve("fail_too_small", "en", Some("IncorrectResult"))
                .unwrap()
                .content,
            "Wrong result."
        );
        assert!(catalog.resolve("fail_too_small", "en", None).is_none());
        assert!(catalog.resolve("CorrectResult", "fi", Some("Missing")).is_none());
    }

    #[test]
    fn test_string_override_keeps_hints() {
        let mut overrides = MessageOverrides::new();
        overrides.entry("en".to_string()).or_default().insert(
            "CorrectResult".to_string(),
            MessagePatch::Content("Great!".to_string()),
        );
        let layered = make_catalog().with_overrides(&overrides);
        let entry = layered.get("CorrectResult", "en").unwrap();
        assert_eq!(entry.content, "Great!");
        assert_eq!(entry.hints, vec!["keep going".to_string()]);
    }

    #[test]
    fn test_untouched_key_resolves_to_default() {
        let mut overrides = MessageOverrides::new();
        overrides.entry("en".to_string()).or_default().insert(
            "fail_negative".to_string(),
            MessagePatch::Entry {
                content: Some("Negative!".to_string()),
                hints: None,
                triggers: Some(vec!["sign".to_string(), "sign".to_string()]),
            },
        );
        let defaults = make_catalog();
        let layered = defaults.with_overrides(&overrides);
        assert_eq!(
            layered.get("IncorrectResult", "en"),
            defaults.get("IncorrectResult", "en")
        );
        let added = layered.get("fail_negative", "en").unwrap();
        assert_eq!(added.content, "Negative!");
        assert_eq!(added.triggers, vec!["sign".to_string()]);
    }

    #[test]
    fn test_render_placeholders() {
        let args = FormatArgs::new().with("name", "area").with("res", "4");
        assert_eq!(render("Testing {name}...", &args), "Testing area...");
        assert_eq!(render("{res:>3} and {missing}", &args), "4 and {missing}");
        assert_eq!(render("{{{{{{\n{res}\n}}}}}}", &args), "{{{\n4\n}}}");
        assert_eq!(render("dangling { brace", &args), "dangling { brace");
        assert_eq!(render("{not a name}", &args), "{not a name}");
    }

    #[test]
    fn test_render_unicode() {
        let args = FormatArgs::new().with("x", "ä");
        assert_eq!(render("ö{x}ü", &args), "öäü");
    }
}
