/// Fault Taxonomy
///
/// **Core Responsibility:**
/// Translate whatever went wrong inside candidate code into a closed set of
/// kinds that map one-to-one onto message catalog keys.
///
/// **Critical Properties:**
/// - Classification happens at the execution boundary, explicitly
/// - Unknown runtime errors keep their name in `Other` and resolve to the
///   generic message
/// - Source locations are best effort and point into candidate code only

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Syntax,
    Indentation,
    UndefinedName,
    Type,
    Value,
    Index,
    Attribute,
    Import,
    EndOfInput,
    EarlyExit,
    NotCallable,
    Other(String),
}

impl FaultKind {
    /// Catalog key (and display name) of this kind.
    pub fn catalog_key(&self) -> &str {
        match self {
            FaultKind::Syntax => "SyntaxError",
            FaultKind::Indentation => "IndentationError",
            FaultKind::UndefinedName => "NameError",
            FaultKind::Type => "TypeError",
            FaultKind::Value => "ValueError",
            FaultKind::Index => "IndexError",
            FaultKind::Attribute => "AttributeError",
            FaultKind::Import => "ImportError",
            FaultKind::EndOfInput => "EOFError",
            FaultKind::EarlyExit => "SystemExit",
            FaultKind::NotCallable => "IsNotFunction",
            FaultKind::Other(name) => name,
        }
    }

    /// Classify a runtime error by the name the runtime gave it.
    pub fn from_name(name: &str) -> Self {
        match name {
            "SyntaxError" => FaultKind::Syntax,
            "IndentationError" => FaultKind::Indentation,
            "NameError" => FaultKind::UndefinedName,
            "TypeError" => FaultKind::Type,
            "ValueError" => FaultKind::Value,
            "IndexError" => FaultKind::Index,
            "AttributeError" => FaultKind::Attribute,
            "ImportError" => FaultKind::Import,
            "EOFError" => FaultKind::EndOfInput,
            "SystemExit" => FaultKind::EarlyExit,
            "IsNotFunction" => FaultKind::NotCallable,
            other => FaultKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub text: String,
}

/// A classified failure raised by candidate code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, line: u32, text: impl Into<String>) -> Self {
        self.location = Some(SourceLocation {
            line,
            text: text.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        self.kind.catalog_key()
    }

    /// Classify a traceback-style stderr dump.
    ///
    /// The last `Name: message` line names the fault; the innermost
    /// `File "...", line N` frame that mentions `file_name` gives the
    /// location, with the source line taken from the following line.
    pub fn from_traceback(stderr: &str, file_name: &str) -> Option<Self> {
        let last = stderr.lines().rev().find(|l| !l.trim().is_empty())?.trim();
        let (name, message) = match last.split_once(':') {
            Some((name, message)) => (name.trim(), message.trim()),
            None => (last, ""),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return None;
        }
        let short_name = name.rsplit('.').next().unwrap_or(name);
        let mut fault = Fault::new(FaultKind::from_name(short_name), message);

        let lines: Vec<&str> = stderr.lines().collect();
        for (idx, line) in lines.iter().enumerate().rev() {
            if let Some(lineno) = frame_line(line, file_name) {
                let text = lines
                    .get(idx + 1)
                    .filter(|next| !next.trim_start().starts_with("File \""))
                    .map(|next| next.trim().to_string())
                    .unwrap_or_default();
                fault = fault.at(lineno, text);
                break;
            }
        }
        Some(fault)
    }
}

fn frame_line(line: &str, file_name: &str) -> Option<u32> {
    let rest = line.trim_start().strip_prefix("File \"")?;
    let (path, rest) = rest.split_once('"')?;
    if !path.ends_with(file_name) {
        return None;
    }
    let rest = rest.trim_start_matches(',').trim_start().strip_prefix("line ")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip_for_known_kinds() {
        for kind in [
            FaultKind::Syntax,
            FaultKind::Indentation,
            FaultKind::UndefinedName,
            FaultKind::EndOfInput,
            FaultKind::EarlyExit,
            FaultKind::NotCallable,
        ] {
            assert_eq!(FaultKind::from_name(kind.catalog_key()), kind);
        }
    }

    #[test]
    fn test_unknown_name_is_kept() {
        let kind = FaultKind::from_name("ZeroDivisionError");
        assert_eq!(kind, FaultKind::Other("ZeroDivisionError".to_string()));
        assert_eq!(kind.catalog_key(), "ZeroDivisionError");
    }

    #[test]
    fn test_display() {
        let fault = Fault::new(FaultKind::Value, "bad literal");
        assert_eq!(fault.to_string(), "ValueError: bad literal");
    }

    #[test]
    fn test_from_traceback_picks_innermost_candidate_frame() {
        let stderr = "Traceback (most recent call last):\n  \
            File \"/srv/runner.py\", line 40, in <module>\n    main()\n  \
            File \"/tmp/x/answer.py\", line 3, in <module>\n    n = int(input())\n  \
            File \"/tmp/x/answer.py\", line 7, in parse\n    return int(s)\n\
            ValueError: invalid literal for int() with base 10: 'x'\n";
        let fault = Fault::from_traceback(stderr, "answer.py").unwrap();
        assert_eq!(fault.kind, FaultKind::Value);
        assert_eq!(fault.message, "invalid literal for int() with base 10: 'x'");
        let location = fault.location.unwrap();
        assert_eq!(location.line, 7);
        assert_eq!(location.text, "return int(s)");
    }

    #[test]
    fn test_from_traceback_dotted_name_without_frames() {
        let fault = Fault::from_traceback("json.decoder.JSONDecodeError: oops", "a.py").unwrap();
        assert_eq!(fault.kind, FaultKind::Other("JSONDecodeError".to_string()));
        assert!(fault.location.is_none());
    }

    #[test]
    fn test_from_traceback_rejects_free_text() {
        assert!(Fault::from_traceback("segmentation fault (core dumped)", "a.py").is_none());
        assert!(Fault::from_traceback("", "a.py").is_none());
    }
}
