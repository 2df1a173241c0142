/// Presenter Layer
///
/// Formatting-only helpers that turn values into the text shown in
/// diagnostics. Nothing here influences whether a case passes.

use serde_json::Value;

/// Calls longer than this are split one argument per line.
const CALL_WIDTH: usize = 80;

/// Compact single-value rendering; strings keep their quotes so `"5"` and
/// `5` stay distinguishable.
pub fn repr(value: &Value) -> String {
    value.to_string()
}

/// Lists are space separated, objects one `key: value` per line.
pub fn present_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(repr).collect::<Vec<_>>().join(" "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, repr(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => repr(other),
    }
}

pub fn present_block(body: &str, highlight: Option<&str>) -> String {
    match highlight {
        Some(lang) => format!("{{{{{{highlight={}\n{}\n}}}}}}", lang, body),
        None => format!("{{{{{{\n{}\n}}}}}}", body),
    }
}

pub trait Presenter {
    /// Markup tag for code blocks, if any.
    fn highlight(&self) -> Option<&str> {
        None
    }

    fn arguments(&self, args: &[Value]) -> String {
        args.iter().map(repr).collect::<Vec<_>>().join(", ")
    }

    fn inputs(&self, inputs: &[String]) -> String {
        present_block(&inputs.join("\n"), None)
    }

    fn call(&self, function: &str, args: &[Value]) -> String {
        let line = format!("{}({})", function, self.arguments(args));
        let body = if line.chars().count() > CALL_WIDTH {
            let mut split = format!("{}(\n", function);
            let rendered: Vec<String> = args.iter().map(|a| format!("    {}", repr(a))).collect();
            split.push_str(&rendered.join(",\n"));
            split.push_str("\n)");
            split
        } else {
            line
        };
        present_block(&body, self.highlight())
    }

    fn reference(&self, value: &Value) -> String {
        present_value(value)
    }

    fn result(&self, value: &Value) -> String {
        present_value(value)
    }

    fn parsed(&self, value: &Value) -> String {
        present_value(value)
    }

    /// `name = value` lines, sorted, private (`_`) names skipped.
    fn variables(&self, vars: &Value) -> String {
        match vars {
            Value::Object(map) => {
                let mut names: Vec<&String> = map.keys().filter(|k| !k.starts_with('_')).collect();
                names.sort();
                names
                    .into_iter()
                    .map(|name| format!("{} = {}", name, repr(&map[name.as_str()])))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            other => present_value(other),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefaultPresenter {
    pub highlight: Option<String>,
}

impl DefaultPresenter {
    pub fn with_highlight(highlight: impl Into<String>) -> Self {
        Self {
            highlight: Some(highlight.into()),
        }
    }
}

impl Presenter for DefaultPresenter {
    fn highlight(&self) -> Option<&str> {
        self.highlight.as_deref()
    }
}
