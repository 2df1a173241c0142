//! Evaluation harness: loads a submission under a controlled I/O context,
//! drives test cases through it, compares against a trusted reference and
//! accumulates a localized diagnostic report.

pub mod candidate;
pub mod capture;
pub mod catalog;
pub mod checker;
pub mod config;
pub mod defaults;
pub mod driver;
pub mod error;
pub mod fault;
pub mod harness;
pub mod loader;
pub mod oracle;
pub mod parser;
pub mod presenter;
pub mod process;
pub mod reporter;
pub mod validation;

#[cfg(test)]
mod harness_tests;

pub use candidate::{Candidate, CandidateSource, Namespace, NativeModule};
pub use capture::{CaptureStream, InputFeed, IoContext};
pub use catalog::{FormatArgs, MessageCatalog, MessageEntry};
pub use checker::{run_checker, CheckOutcome, CheckRequest, ConfiguredStrategy};
pub use config::{LanguageConfig, LanguageConfigManager, RunnerConfig};
pub use error::{HarnessError, Result};
pub use fault::{Fault, FaultKind, SourceLocation};
pub use harness::{GroupSummary, Harness, Strategy, TestMode, TestOptions, TestPlan};
pub use loader::{CandidateHandle, LoadOptions};
pub use oracle::{CaseSource, FnOracle, Oracle, TableOracle, TestCase};
pub use parser::{OutputParser, ParseError, PatternParser, RawOutput};
pub use presenter::{DefaultPresenter, Presenter};
pub use process::{ProcessEngine, ProcessOracle, ProcessSource, SnippetSource};
pub use reporter::Reporter;
pub use validation::{
    CaseContext, FnExtractor, FnProbe, InfoExtractor, Mismatch, NoInfo, OutputPattern, OutputValidator, Probe,
    Validator, Verdict,
};

pub use senpai_common::types::{Message, Report, Run, Severity, TestGroup};
