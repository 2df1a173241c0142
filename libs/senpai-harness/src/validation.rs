/// Validation Pipeline Building Blocks
///
/// **Core Responsibility:**
/// Decide whether a case passed, and collect the secondary signals that
/// explain why it did not.
///
/// **Critical Properties:**
/// - Validators are assert-style: `Err(Mismatch)` optionally names the
///   message key to show instead of the generic one
/// - Probes and info extractors run on the full case context and never
///   influence the verdict
/// - The recurrence check looks exactly one case back

use regex::Regex;
use senpai_common::checker::{OutputCheckSpec, ValidatorKind};
use serde_json::Value;

/// A failed assertion, optionally carrying the message key to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mismatch {
    pub reason: Option<String>,
}

impl Mismatch {
    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

pub type Verdict = Result<(), Mismatch>;

pub fn ensure(condition: bool, reason: Option<&str>) -> Verdict {
    if condition {
        Ok(())
    } else {
        Err(Mismatch {
            reason: reason.map(str::to_string),
        })
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, expected: &Value, result: &Value, parsed: &Value) -> Verdict;
}

impl<F> Validator for F
where
    F: Fn(&Value, &Value, &Value) -> Verdict + Send + Sync,
{
    fn validate(&self, expected: &Value, result: &Value, parsed: &Value) -> Verdict {
        self(expected, result, parsed)
    }
}

fn trimmed(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// Compares the return value; strings ignore surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultValidator;

impl Validator for ResultValidator {
    fn validate(&self, expected: &Value, result: &Value, _parsed: &Value) -> Verdict {
        ensure(trimmed(expected) == trimmed(result), None)
    }
}

/// Compares the parsed output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParsedResultValidator;

impl Validator for ParsedResultValidator {
    fn validate(&self, expected: &Value, _result: &Value, parsed: &Value) -> Verdict {
        ensure(trimmed(expected) == trimmed(parsed), None)
    }
}

/// Compares the return value with numbers rounded to `digits` decimals.
#[derive(Debug, Clone, Copy)]
pub struct RoundingFloatValidator {
    pub digits: i32,
}

impl Default for RoundingFloatValidator {
    fn default() -> Self {
        Self { digits: 2 }
    }
}

impl RoundingFloatValidator {
    fn round(&self, value: &Value) -> Value {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) if !(n.is_i64() || n.is_u64()) => {
                    let scale = 10f64.powi(self.digits);
                    serde_json::Number::from_f64((f * scale).round() / scale)
                        .map(Value::Number)
                        .unwrap_or_else(|| value.clone())
                }
                _ => value.clone(),
            },
            Value::Array(items) => Value::Array(items.iter().map(|v| self.round(v)).collect()),
            other => other.clone(),
        }
    }

    fn same(&self, a: &Value, b: &Value) -> bool {
        match (self.round(a), self.round(b)) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            (Value::Array(xs), Value::Array(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| self.same(x, y))
            }
            (x, y) => x == y,
        }
    }
}

impl Validator for RoundingFloatValidator {
    fn validate(&self, expected: &Value, result: &Value, _parsed: &Value) -> Verdict {
        ensure(self.same(expected, result), None)
    }
}

/// Parsed output must be a list matching the expected one item by item.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParsedListValidator;

impl Validator for ParsedListValidator {
    fn validate(&self, expected: &Value, _result: &Value, parsed: &Value) -> Verdict {
        let (Value::Array(expected), Value::Array(parsed)) = (expected, parsed) else {
            return Err(Mismatch::default());
        };
        ensure(expected.len() == parsed.len(), None)?;
        for (e, p) in expected.iter().zip(parsed.iter()) {
            ensure(trimmed(e) == trimmed(p), None)?;
        }
        Ok(())
    }
}

/// Every expected public variable must exist with an equal value.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariablesValidator;

impl Validator for VariablesValidator {
    fn validate(&self, expected: &Value, result: &Value, _parsed: &Value) -> Verdict {
        let Some(expected) = expected.as_object() else {
            return Ok(());
        };
        let empty = serde_json::Map::new();
        let actual = result.as_object().unwrap_or(&empty);
        for (name, value) in expected.iter().filter(|(n, _)| !n.starts_with('_')) {
            match actual.get(name) {
                None => return Err(Mismatch::because("fail_missing_variable")),
                Some(v) if v != value => return Err(Mismatch::because("fail_variable_value")),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

pub fn validator_for(kind: ValidatorKind) -> Box<dyn Validator> {
    match kind {
        ValidatorKind::Result => Box::new(ResultValidator),
        ValidatorKind::Parsed => Box::new(ParsedResultValidator),
        ValidatorKind::RoundingFloat => Box::new(RoundingFloatValidator::default()),
        ValidatorKind::ParsedList => Box::new(ParsedListValidator),
        ValidatorKind::Variables => Box::new(VariablesValidator),
    }
}

/// Everything known about a case once the candidate has run.
#[derive(Debug, Clone, Copy)]
pub struct CaseContext<'a> {
    pub index: usize,
    /// Arguments as they were before the candidate ran.
    pub arguments: &'a [Value],
    pub inputs: &'a [String],
    pub expected: &'a Value,
    pub result: &'a Value,
    pub parsed: &'a Value,
    pub output: &'a str,
}

/// Assert-style check run after a failed case.
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;
    fn probe(&self, case: &CaseContext<'_>) -> Verdict;
}

pub struct FnProbe<F> {
    name: String,
    check: F,
}

impl<F> FnProbe<F>
where
    F: Fn(&CaseContext<'_>) -> Verdict + Send + Sync,
{
    pub fn new(name: &str, check: F) -> Self {
        Self {
            name: name.to_string(),
            check,
        }
    }
}

impl<F> Probe for FnProbe<F>
where
    F: Fn(&CaseContext<'_>) -> Verdict + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self, case: &CaseContext<'_>) -> Verdict {
        (self.check)(case)
    }
}

/// Signal from an info extractor that it has nothing to say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoInfo;

pub trait InfoExtractor: Send + Sync {
    fn name(&self) -> &str;
    fn extract(&self, case: &CaseContext<'_>) -> Result<String, NoInfo>;
}

pub struct FnExtractor<F> {
    name: String,
    extract: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(&CaseContext<'_>) -> Result<String, NoInfo> + Send + Sync,
{
    pub fn new(name: &str, extract: F) -> Self {
        Self {
            name: name.to_string(),
            extract,
        }
    }
}

impl<F> InfoExtractor for FnExtractor<F>
where
    F: Fn(&CaseContext<'_>) -> Result<String, NoInfo> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, case: &CaseContext<'_>) -> Result<String, NoInfo> {
        (self.extract)(case)
    }
}

/// Assertion on the raw captured text, reported separately from the verdict.
pub trait OutputValidator: Send + Sync {
    fn validate(&self, output: &str, arguments: &[Value], inputs: &[String]) -> Verdict;
}

impl<F> OutputValidator for F
where
    F: Fn(&str, &[Value], &[String]) -> Verdict + Send + Sync,
{
    fn validate(&self, output: &str, arguments: &[Value], inputs: &[String]) -> Verdict {
        self(output, arguments, inputs)
    }
}

/// Output must (or must not) contain a match of a regular expression.
#[derive(Debug, Clone)]
pub struct OutputPattern {
    regex: Regex,
    must_match: bool,
    reason: Option<String>,
}

impl OutputPattern {
    pub fn new(pattern: &str, must_match: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            must_match,
            reason: None,
        })
    }

    pub fn from_spec(spec: &OutputCheckSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&spec.pattern)?,
            must_match: spec.must_match,
            reason: spec.reason.clone(),
        })
    }
}

impl OutputValidator for OutputPattern {
    fn validate(&self, output: &str, _arguments: &[Value], _inputs: &[String]) -> Verdict {
        ensure(
            self.regex.is_match(output) == self.must_match,
            self.reason.as_deref(),
        )
    }
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

/// Remembers the previous case's result and parsed output.
#[derive(Debug, Clone, Default)]
pub struct RecurrenceTracker {
    previous_result: Option<Value>,
    previous_parsed: Option<Value>,
}

impl RecurrenceTracker {
    /// True when this case repeats the immediately preceding one.
    ///
    /// `result` is `None` for modes that only judge output. Parsed output
    /// is compared only when there is something to compare.
    pub fn repeats(&self, result: Option<&Value>, parsed: &Value) -> bool {
        let same_result = matches!(
            (result, &self.previous_result),
            (Some(now), Some(before)) if now == before
        );
        let same_parsed = is_meaningful(parsed) && self.previous_parsed.as_ref() == Some(parsed);
        same_result || same_parsed
    }

    pub fn record(&mut self, result: Option<&Value>, parsed: &Value) {
        self.previous_result = result.cloned();
        self.previous_parsed = Some(parsed.clone());
    }
}
