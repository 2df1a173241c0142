/// Oracle Evaluator
///
/// **Core Responsibility:**
/// Produce the expected result of every test case from a trusted reference
/// before any candidate code runs.
///
/// **Critical Properties:**
/// - The reference always receives its own clone of the arguments
/// - All expectations of a group exist before the first candidate call
/// - A failing reference is a harness error, not a candidate fault

use crate::error::{HarnessError, Result};
use serde_json::Value;
use tracing::debug;

/// One concrete input: call arguments and/or input lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCase {
    pub arguments: Vec<Value>,
    pub inputs: Vec<String>,
}

impl TestCase {
    pub fn new(arguments: Vec<Value>, inputs: Vec<String>) -> Self {
        Self { arguments, inputs }
    }

    pub fn args(arguments: Vec<Value>) -> Self {
        Self {
            arguments,
            inputs: Vec::new(),
        }
    }

    pub fn inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            arguments: Vec::new(),
            inputs: inputs.into_iter().map(Into::into).collect(),
        }
    }
}

/// Test cases given up front or generated on first use.
pub enum CaseSource {
    Eager(Vec<TestCase>),
    Lazy(Box<dyn FnOnce() -> Vec<TestCase> + Send>),
}

impl CaseSource {
    pub fn lazy<F>(generate: F) -> Self
    where
        F: FnOnce() -> Vec<TestCase> + Send + 'static,
    {
        CaseSource::Lazy(Box::new(generate))
    }

    pub fn into_cases(self) -> Vec<TestCase> {
        match self {
            CaseSource::Eager(cases) => cases,
            CaseSource::Lazy(generate) => generate(),
        }
    }
}

impl From<Vec<TestCase>> for CaseSource {
    fn from(cases: Vec<TestCase>) -> Self {
        CaseSource::Eager(cases)
    }
}

pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    /// Expected result for case `index`.
    fn evaluate(&self, index: usize, arguments: Vec<Value>, inputs: &[String]) -> Result<Value>;
}

type Positional = Box<dyn Fn(Vec<Value>) -> Value + Send + Sync>;
type WithInputs = Box<dyn Fn(Vec<Value>, &[String]) -> Value + Send + Sync>;

enum Convention {
    Positional(Positional),
    WithInputs(WithInputs),
}

/// Reference implemented as a Rust closure.
pub struct FnOracle {
    name: String,
    convention: Convention,
}

impl FnOracle {
    /// Reference that only sees the arguments.
    pub fn positional<F>(name: &str, reference: F) -> Self
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            convention: Convention::Positional(Box::new(reference)),
        }
    }

    /// Reference whose result depends on the input lines as well.
    pub fn with_inputs<F>(name: &str, reference: F) -> Self
    where
        F: Fn(Vec<Value>, &[String]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            convention: Convention::WithInputs(Box::new(reference)),
        }
    }
}

impl Oracle for FnOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, _index: usize, arguments: Vec<Value>, inputs: &[String]) -> Result<Value> {
        Ok(match &self.convention {
            Convention::Positional(reference) => reference(arguments),
            Convention::WithInputs(reference) => reference(arguments, inputs),
        })
    }
}

/// Expected values listed per case.
pub struct TableOracle {
    name: String,
    expected: Vec<Value>,
}

impl TableOracle {
    pub fn new(name: &str, expected: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            expected,
        }
    }
}

impl Oracle for TableOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, index: usize, _arguments: Vec<Value>, _inputs: &[String]) -> Result<Value> {
        self.expected
            .get(index)
            .cloned()
            .ok_or_else(|| HarnessError::Reference {
                name: self.name.clone(),
                reason: format!("no expected value for case {}", index + 1),
            })
    }
}

/// A test case paired with its precomputed expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCase {
    pub case: TestCase,
    pub expected: Value,
}

/// Evaluate the reference for every case up front.
pub fn precompute<C>(cases: Vec<TestCase>, oracle: &dyn Oracle, cloner: C) -> Result<Vec<PreparedCase>>
where
    C: Fn(&[Value]) -> Vec<Value>,
{
    let mut prepared = Vec::with_capacity(cases.len());
    for (index, case) in cases.into_iter().enumerate() {
        let expected = oracle.evaluate(index, cloner(&case.arguments), &case.inputs)?;
        debug!(oracle = oracle.name(), case = index + 1, expected = %expected, "Reference evaluated");
        prepared.push(PreparedCase { case, expected });
    }
    Ok(prepared)
}
