/// Output parsers turn captured text into values the validator compares.

use regex::Regex;
use senpai_common::checker::{ParserSpec, ValueKind};
use serde_json::{Number, Value};
use thiserror::Error;

/// "Could not parse" signal; the reason is shown to the student.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub trait OutputParser: Send + Sync {
    fn parse(&self, output: &str) -> Result<Value, ParseError>;

    /// Human-readable description of what the output should look like.
    fn pattern(&self) -> String {
        String::new()
    }
}

/// Passes the captured text through as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawOutput;

impl OutputParser for RawOutput {
    fn parse(&self, output: &str) -> Result<Value, ParseError> {
        Ok(Value::String(output.to_string()))
    }
}

/// Extracts values with a regular expression.
///
/// A single capture group yields a scalar, several yield an array. With
/// `all` every match is collected into an outer array.
#[derive(Debug, Clone)]
pub struct PatternParser {
    regex: Regex,
    kinds: Vec<ValueKind>,
    all: bool,
}

impl PatternParser {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            kinds: Vec::new(),
            all: false,
        })
    }

    pub fn from_spec(spec: &ParserSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&spec.pattern)?,
            kinds: spec.kinds.clone(),
            all: spec.all,
        })
    }

    pub fn kinds(mut self, kinds: Vec<ValueKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn all_matches(mut self) -> Self {
        self.all = true;
        self
    }

    fn convert(&self, group: usize, text: &str) -> Result<Value, ParseError> {
        let text = text.trim();
        match self.kinds.get(group).copied().unwrap_or(ValueKind::Text) {
            ValueKind::Text => Ok(Value::String(text.to_string())),
            ValueKind::Integer => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| ParseError::new(format!("'{}' is not an integer", text))),
            ValueKind::Float => text
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ParseError::new(format!("'{}' is not a decimal number", text))),
        }
    }

    fn extract(&self, captures: &regex::Captures<'_>) -> Result<Value, ParseError> {
        let groups = self.regex.captures_len() - 1;
        if groups == 0 {
            return Ok(Value::String(captures[0].to_string()));
        }
        let mut values = Vec::with_capacity(groups);
        for group in 0..groups {
            let text = captures.get(group + 1).map(|m| m.as_str()).unwrap_or("");
            values.push(self.convert(group, text)?);
        }
        if values.len() == 1 {
            Ok(values.remove(0))
        } else {
            Ok(Value::Array(values))
        }
    }
}

impl OutputParser for PatternParser {
    fn parse(&self, output: &str) -> Result<Value, ParseError> {
        if self.all {
            let values = self
                .regex
                .captures_iter(output)
                .map(|c| self.extract(&c))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err(ParseError::new("nothing in the output matched the expected format"));
            }
            return Ok(Value::Array(values));
        }
        match self.regex.captures(output) {
            Some(captures) => self.extract(&captures),
            None => Err(ParseError::new("nothing in the output matched the expected format")),
        }
    }

    fn pattern(&self) -> String {
        self.regex.as_str().to_string()
    }
}
