use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::checker::CheckerSpec;

/// Outcome class of a single diagnostic message.
///
/// Serialized as the small integer code the front end switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Incorrect,
    Correct,
    Info,
    Error,
    Debug,
    LintConvention,
    LintRefactor,
    LintWarning,
    LintError,
}

impl Severity {
    pub fn code(self) -> u8 {
        match self {
            Severity::Incorrect => 0,
            Severity::Correct => 1,
            Severity::Info => 2,
            Severity::Error => 3,
            Severity::Debug => 4,
            Severity::LintConvention => 10,
            Severity::LintRefactor => 11,
            Severity::LintWarning => 12,
            Severity::LintError => 13,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Severity::Incorrect),
            1 => Some(Severity::Correct),
            2 => Some(Severity::Info),
            3 => Some(Severity::Error),
            4 => Some(Severity::Debug),
            10 => Some(Severity::LintConvention),
            11 => Some(Severity::LintRefactor),
            12 => Some(Severity::LintWarning),
            13 => Some(Severity::LintError),
            _ => None,
        }
    }

    /// True for the verdict-bearing severities that mark a failure.
    pub fn is_failure(self) -> bool {
        matches!(self, Severity::Incorrect | Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Incorrect => "INCORRECT",
            Severity::Correct => "CORRECT",
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
            Severity::Debug => "DEBUG",
            Severity::LintConvention => "LINT_C",
            Severity::LintRefactor => "LINT_R",
            Severity::LintWarning => "LINT_W",
            Severity::LintError => "LINT_E",
        };
        write!(f, "{}", label)
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Severity::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown severity code {}", code)))
    }
}

/// One rendered diagnostic event. Immutable once appended to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "msg")]
    pub content: String,
    #[serde(rename = "flag")]
    pub severity: Severity,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Events produced for one test case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub output: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestGroup {
    pub title: String,
    pub runs: Vec<Run>,
}

/// Top-level grading artifact handed to the front end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub tester: String,
    #[serde(rename = "tests")]
    pub groups: Vec<TestGroup>,
}

impl Report {
    pub fn new(tester: impl Into<String>) -> Self {
        Self {
            tester: tester.into(),
            groups: Vec::new(),
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.groups
            .iter()
            .flat_map(|g| g.runs.iter())
            .flat_map(|r| r.output.iter())
    }

    /// A report passes when something was judged correct and nothing failed.
    pub fn passed(&self) -> bool {
        let mut any_correct = false;
        for message in self.messages() {
            if message.severity.is_failure() {
                return false;
            }
            any_correct |= message.severity == Severity::Correct;
        }
        any_correct
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Nest the report under `key` of an existing wrapper document.
    ///
    /// Routine exercises ship the report alongside their own state
    /// (`progress`, `history`) in one object.
    pub fn wrap_into(
        &self,
        mut wrapper: serde_json::Map<String, serde_json::Value>,
        key: &str,
    ) -> serde_json::Result<serde_json::Value> {
        wrapper.insert(key.to_string(), serde_json::to_value(self)?);
        Ok(serde_json::Value::Object(wrapper))
    }
}

/// `"done / total"` counter carried by routine exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(done: u32, total: u32) -> Self {
        Self { done, total }
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.done, self.total)
    }
}

impl FromStr for Progress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (done, total) = s
            .split_once('/')
            .ok_or_else(|| format!("progress '{}' is not of the form 'done / total'", s))?;
        let done = done
            .trim()
            .parse()
            .map_err(|e| format!("invalid progress count '{}': {}", done.trim(), e))?;
        let total = total
            .trim()
            .parse()
            .map_err(|e| format!("invalid progress total '{}': {}", total.trim(), e))?;
        Ok(Self { done, total })
    }
}

impl Serialize for Progress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `[testKindId, passed]` pair; serialized as a two element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry(pub u32, pub bool);

/// State owned by the exercise-selection logic. Passed through untouched
/// apart from `record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseState {
    pub progress: Progress,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExerciseState {
    /// Append the outcome of one attempt; a pass advances progress.
    pub fn record(&mut self, kind: u32, passed: bool) {
        self.history.push(HistoryEntry(kind, passed));
        if passed && !self.progress.is_complete() {
            self.progress.done += 1;
        }
    }
}

/// A submission file as delivered by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub file_name: String,
    pub source_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingJob {
    pub id: Uuid,
    pub language: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub submission: Submission,
    pub checker: CheckerSpec,
    #[serde(default)]
    pub state: Option<ExerciseState>,
    #[serde(default)]
    pub question_class: Option<u32>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

fn default_locale() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingStatus {
    Passed,
    Failed,
    /// The harness itself could not run (bad checker, missing runner).
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingResult {
    pub job_id: Uuid,
    pub status: GradingStatus,
    pub report: Report,
    #[serde(default)]
    pub state: Option<ExerciseState>,
    #[serde(default)]
    pub error: Option<String>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
