/// Checker Definitions - Declarative Exercise Configuration
///
/// **Core Responsibility:**
/// Describe, as plain data, how one exercise grades a submission: load
/// options, the ordered list of tests, references, and message overrides.
///
/// **Critical Properties:**
/// - Pure serde data; the harness turns it into runtime strategy objects
/// - Every option has the same default the harness applies in code
/// - Shared by the CLI (checker files on disk) and the worker (job payloads)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-locale message overrides: `{"en": {"IncorrectResult": ...}}`.
pub type MessageOverrides = BTreeMap<String, BTreeMap<String, MessagePatch>>;

/// A bare string replaces only the template; an object patches the fields it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePatch {
    Content(String),
    Entry {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        hints: Option<Vec<String>>,
        #[serde(default)]
        triggers: Option<Vec<String>>,
    },
}

/// Function name shown to (and called on) the candidate, optionally per locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedName {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedName {
    pub fn for_locale(&self, locale: &str) -> Option<&str> {
        match self {
            LocalizedName::Plain(name) => Some(name),
            LocalizedName::Localized(names) => names
                .get(locale)
                .or_else(|| names.get("en"))
                .or_else(|| names.values().next())
                .map(String::as_str),
        }
    }
}

impl From<&str> for LocalizedName {
    fn from(name: &str) -> Self {
        LocalizedName::Plain(name.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerSpec {
    pub tester: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub load: LoadSpec,
    pub tests: Vec<TestSpec>,
    /// Applied to every group before the group's own overrides.
    #[serde(default)]
    pub messages: MessageOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSpec {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default = "default_true")]
    pub allow_output: bool,
    #[serde(default = "default_true")]
    pub hide_output: bool,
    #[serde(default)]
    pub messages: MessageOverrides,
}

impl Default for LoadSpec {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            allow_output: true,
            hide_output: true,
            messages: MessageOverrides::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TestSpec {
    Function(FunctionSpec),
    Program(ProgramSpec),
    Snippet(SnippetSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: LocalizedName,
    pub cases: Vec<CaseSpec>,
    /// Without a reference program each case must carry `expected`.
    #[serde(default)]
    pub reference: Option<ReferenceSpec>,
    #[serde(flatten)]
    pub options: TestOptionsSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub cases: Vec<CaseSpec>,
    #[serde(default)]
    pub reference: Option<ReferenceSpec>,
    #[serde(flatten)]
    pub options: TestOptionsSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetSpec {
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Code placed before the submitted snippet.
    #[serde(default)]
    pub prelude: String,
    /// Code placed after the submitted snippet.
    #[serde(default)]
    pub postlude: String,
    #[serde(default)]
    pub reference: Option<ReferenceSpec>,
    /// Expected variables when no reference program is given.
    #[serde(default)]
    pub expected: Option<Value>,
    #[serde(flatten)]
    pub options: TestOptionsSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseSpec {
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub expected: Option<Value>,
}

/// A trusted program run through the language runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSpec {
    /// Message key used when this reference is an alternate.
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub function: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Result,
    Parsed,
    RoundingFloat,
    ParsedList,
    Variables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Integer,
    Float,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserSpec {
    pub pattern: String,
    /// Conversion per capture group; missing entries stay text.
    #[serde(default)]
    pub kinds: Vec<ValueKind>,
    /// Collect every match instead of the first one.
    #[serde(default)]
    pub all: bool,
}

/// Assertion on the raw captured output, independent of the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputCheckSpec {
    pub pattern: String,
    #[serde(default = "default_true")]
    pub must_match: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOptionsSpec {
    #[serde(default)]
    pub validator: Option<ValidatorKind>,
    #[serde(default)]
    pub parser: Option<ParserSpec>,
    #[serde(default)]
    pub output_check: Option<OutputCheckSpec>,
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    #[serde(default = "default_true")]
    pub test_recurrence: bool,
    #[serde(default = "default_true")]
    pub hide_output: bool,
    #[serde(default)]
    pub alternates: Vec<ReferenceSpec>,
    #[serde(default)]
    pub messages: MessageOverrides,
}

impl Default for TestOptionsSpec {
    fn default() -> Self {
        Self {
            validator: None,
            parser: None,
            output_check: None,
            repeat: default_repeat(),
            test_recurrence: true,
            hide_output: true,
            alternates: Vec::new(),
            messages: MessageOverrides::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_repeat() -> usize {
    1
}
