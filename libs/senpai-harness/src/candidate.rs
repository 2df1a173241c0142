/// Candidate Boundary
///
/// **Core Responsibility:**
/// Define how the harness reaches submitted code: a source that can be
/// instantiated any number of times, and an instance whose functions can
/// be called and whose top-level variables can be inspected.
///
/// **Critical Properties:**
/// - Every `instantiate` starts from a fresh namespace; nothing carries over
/// - Everything that goes wrong inside candidate code comes back as a `Fault`
/// - All I/O goes through the `IoContext` handed in by the caller

use crate::capture::IoContext;
use crate::fault::{Fault, FaultKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait CandidateSource: Send + Sync {
    /// File name the submission was delivered under, e.g. `answer.py`.
    fn file_name(&self) -> &str;

    /// Run the top-level code against a fresh namespace, as a program.
    fn instantiate(&self, io: &mut IoContext<'_>) -> Result<Box<dyn Candidate>, Fault>;

    /// Load the code as a library module: top-level code runs, but a
    /// program entry point guarded on being the main module does not.
    fn import(&self, io: &mut IoContext<'_>) -> Result<Box<dyn Candidate>, Fault> {
        self.instantiate(io)
    }
}

pub trait Candidate {
    /// Call a top-level function. Arguments may be mutated in place.
    fn call(&mut self, function: &str, args: &mut [Value], io: &mut IoContext<'_>) -> Result<Value, Fault>;

    /// Call `repeat` times in a row, keeping the last result.
    fn call_repeated(
        &mut self,
        function: &str,
        args: &mut [Value],
        repeat: usize,
        io: &mut IoContext<'_>,
    ) -> Result<Value, Fault> {
        let mut result = Value::Null;
        for _ in 0..repeat.max(1) {
            result = self.call(function, args, io)?;
        }
        Ok(result)
    }

    /// Public top-level variables after instantiation.
    fn variables(&self) -> BTreeMap<String, Value>;
}

/// Top-level variables of a native candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    vars: BTreeMap<String, Value>,
}

impl Namespace {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.vars.insert(name.to_string(), value.into());
    }

    pub fn public(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

type TopLevel = Arc<dyn Fn(&mut Namespace, &mut IoContext<'_>) -> Result<(), Fault> + Send + Sync>;
type Function =
    Arc<dyn Fn(&mut Namespace, &mut [Value], &mut IoContext<'_>) -> Result<Value, Fault> + Send + Sync>;

/// Candidate code written in Rust and run in process.
///
/// Used for exercises graded entirely in Rust and for exercising the
/// pipeline in tests.
#[derive(Clone)]
pub struct NativeModule {
    file_name: String,
    top_level: Option<TopLevel>,
    functions: BTreeMap<String, Function>,
}

impl NativeModule {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            top_level: None,
            functions: BTreeMap::new(),
        }
    }

    pub fn top_level<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Namespace, &mut IoContext<'_>) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.top_level = Some(Arc::new(body));
        self
    }

    pub fn function<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&mut Namespace, &mut [Value], &mut IoContext<'_>) -> Result<Value, Fault>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(body));
        self
    }
}

impl CandidateSource for NativeModule {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn instantiate(&self, io: &mut IoContext<'_>) -> Result<Box<dyn Candidate>, Fault> {
        let mut namespace = Namespace::default();
        if let Some(body) = &self.top_level {
            body(&mut namespace, io)?;
        }
        Ok(Box::new(NativeCandidate {
            namespace,
            functions: self.functions.clone(),
        }))
    }
}

struct NativeCandidate {
    namespace: Namespace,
    functions: BTreeMap<String, Function>,
}

impl Candidate for NativeCandidate {
    fn call(&mut self, function: &str, args: &mut [Value], io: &mut IoContext<'_>) -> Result<Value, Fault> {
        match self.functions.get(function) {
            Some(body) => body(&mut self.namespace, args, io),
            None if self.namespace.get(function).is_some() => Err(Fault::new(
                FaultKind::NotCallable,
                format!("'{}' is not callable", function),
            )),
            None => Err(Fault::new(
                FaultKind::Attribute,
                format!("module has no attribute '{}'", function),
            )),
        }
    }

    fn variables(&self) -> BTreeMap<String, Value> {
        self.namespace.public()
    }
}
