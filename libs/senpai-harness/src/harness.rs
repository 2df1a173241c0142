/// Test Pipelines
///
/// **Core Responsibility:**
/// Orchestrate one test group: precompute expectations, drive every case
/// through the candidate, judge it, and explain failures in the report.
///
/// **Critical Properties:**
/// - One fixed pipeline for function, program and snippet tests; the mode
///   only changes what is invoked and which vectors are shown
/// - Per-exercise behaviour plugs in through `Strategy`, one method per
///   concern, every method defaulted
/// - Faults and parse failures end only the current case
/// - Secondary diagnostics run only for failed cases and never change the
///   verdict
///
/// **Per-case state machine:**
/// Invoking → {Faulted | Parsed} → Validating → {Correct | Incorrect}
/// → (if incorrect) Diagnosing → Done

use crate::candidate::CandidateSource;
use crate::capture::CaptureStream;
use crate::catalog::FormatArgs;
use crate::defaults;
use crate::driver::{run_case, ExecutionOutcome, Target};
use crate::error::Result;
use crate::loader::{self, CandidateHandle, LoadOptions};
use crate::oracle::{precompute, CaseSource, Oracle, TestCase};
use crate::parser::{OutputParser, ParseError, RawOutput};
use crate::presenter::{DefaultPresenter, Presenter};
use crate::reporter::Reporter;
use crate::validation::{
    CaseContext, InfoExtractor, OutputValidator, ParsedResultValidator, Probe, RecurrenceTracker,
    ResultValidator, Validator, VariablesValidator, Verdict,
};
use senpai_common::checker::MessageOverrides;
use senpai_common::types::{Report, Severity};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

static DEFAULT_PRESENTER: DefaultPresenter = DefaultPresenter { highlight: None };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestMode {
    Function,
    Program,
    Snippet,
}

impl TestMode {
    pub fn default_validator(self) -> &'static dyn Validator {
        match self {
            TestMode::Function => &ResultValidator,
            TestMode::Program => &ParsedResultValidator,
            TestMode::Snippet => &VariablesValidator,
        }
    }

    fn title_key(self) -> &'static str {
        match self {
            TestMode::Function => "FunctionName",
            TestMode::Program => "ProgramName",
            TestMode::Snippet => "SnippetTest",
        }
    }
}

/// Pluggable per-exercise behaviour.
pub trait Strategy: Send + Sync {
    /// Primary verdict for a case.
    fn validate(&self, mode: TestMode, expected: &Value, result: &Value, parsed: &Value) -> Verdict {
        mode.default_validator().validate(expected, result, parsed)
    }

    fn parse_output(&self, output: &str) -> std::result::Result<Value, ParseError> {
        RawOutput.parse(output)
    }

    /// Shown when parsing fails.
    fn output_pattern(&self) -> String {
        String::new()
    }

    /// Independent copy given to the reference and kept for display.
    fn clone_arguments(&self, args: &[Value]) -> Vec<Value> {
        args.to_vec()
    }

    /// Called before each case runs.
    fn on_new_case(&self, _arguments: &[Value], _inputs: &[String]) {}

    /// Choose what gets validated, e.g. an argument mutated in place.
    fn extract_result(&self, _arguments: &[Value], result: Value, _parsed: &Value) -> Value {
        result
    }

    fn presenter(&self) -> &dyn Presenter {
        &DEFAULT_PRESENTER
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl Strategy for DefaultStrategy {}

#[derive(Debug, Clone)]
pub struct TestOptions {
    pub locale: String,
    pub messages: MessageOverrides,
    /// Show the candidate's output after every invocation when false.
    pub hide_output: bool,
    pub test_recurrence: bool,
    pub repeat: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            messages: MessageOverrides::new(),
            hide_output: true,
            test_recurrence: true,
            repeat: 1,
        }
    }
}

/// Everything one test group needs besides the candidate.
pub struct TestPlan {
    pub cases: CaseSource,
    pub reference: Box<dyn Oracle>,
    pub strategy: Box<dyn Strategy>,
    pub alternates: Vec<Box<dyn Oracle>>,
    pub probes: Vec<Box<dyn Probe>>,
    pub extractors: Vec<Box<dyn InfoExtractor>>,
    pub output_validator: Option<Box<dyn OutputValidator>>,
    pub options: TestOptions,
}

impl TestPlan {
    pub fn new(cases: impl Into<CaseSource>, reference: impl Oracle + 'static) -> Self {
        Self::with_reference(cases, Box::new(reference))
    }

    pub fn with_reference(cases: impl Into<CaseSource>, reference: Box<dyn Oracle>) -> Self {
        Self {
            cases: cases.into(),
            reference,
            strategy: Box::new(DefaultStrategy),
            alternates: Vec::new(),
            probes: Vec::new(),
            extractors: Vec::new(),
            output_validator: None,
            options: TestOptions::default(),
        }
    }

    pub fn strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn alternate(mut self, oracle: impl Oracle + 'static) -> Self {
        self.alternates.push(Box::new(oracle));
        self
    }

    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub fn extractor(mut self, extractor: impl InfoExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn output_validator(mut self, validator: impl OutputValidator + 'static) -> Self {
        self.output_validator = Some(Box::new(validator));
        self
    }

    pub fn options(mut self, options: TestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn locale(mut self, locale: &str) -> Self {
        self.options.locale = locale.to_string();
        self
    }

    pub fn repeat(mut self, repeat: usize) -> Self {
        self.options.repeat = repeat;
        self
    }

    pub fn recurrence(mut self, enabled: bool) -> Self {
        self.options.test_recurrence = enabled;
        self
    }

    pub fn hide_output(mut self, hide: bool) -> Self {
        self.options.hide_output = hide;
        self
    }

    pub fn messages(mut self, messages: MessageOverrides) -> Self {
        self.options.messages = messages;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupSummary {
    pub cases: usize,
    pub passed: usize,
    pub faulted: usize,
}

impl GroupSummary {
    pub fn all_passed(&self) -> bool {
        self.cases > 0 && self.passed == self.cases
    }
}

/// Owns the report for one grading session.
pub struct Harness {
    reporter: Reporter,
}

impl Harness {
    pub fn new(tester: &str) -> Self {
        Self {
            reporter: Reporter::new(tester),
        }
    }

    pub fn load_module(
        &mut self,
        source: Arc<dyn CandidateSource>,
        options: &LoadOptions,
    ) -> Option<CandidateHandle> {
        loader::load_module(&mut self.reporter, source, options)
    }

    /// Call `function` on a fresh instance of the candidate for every case.
    pub fn test_function(&mut self, handle: &CandidateHandle, function: &str, plan: TestPlan) -> Result<GroupSummary> {
        let title = FormatArgs::new().with("name", function);
        let group = Group {
            mode: TestMode::Function,
            target: Target::Function(function),
            source: handle.source().as_ref(),
            load_inputs: handle.load_inputs(),
            name: function,
        };
        self.run_group(group, &title, plan)
    }

    /// Run the whole program once per case with that case's input lines.
    pub fn test_program(&mut self, handle: &CandidateHandle, plan: TestPlan) -> Result<GroupSummary> {
        let title = FormatArgs::new().with("name", handle.name());
        let group = Group {
            mode: TestMode::Program,
            target: Target::Program,
            source: handle.source().as_ref(),
            load_inputs: &[],
            name: handle.name(),
        };
        self.run_group(group, &title, plan)
    }

    /// Run a code fragment and judge the variables it leaves behind.
    ///
    /// Without explicit cases the snippet runs once with no input.
    pub fn test_snippet(&mut self, source: Arc<dyn CandidateSource>, mut plan: TestPlan) -> Result<GroupSummary> {
        let cases = std::mem::replace(&mut plan.cases, CaseSource::Eager(Vec::new())).into_cases();
        plan.cases = if cases.is_empty() {
            CaseSource::Eager(vec![TestCase::default()])
        } else {
            CaseSource::Eager(cases)
        };
        let group = Group {
            mode: TestMode::Snippet,
            target: Target::Snippet,
            source: source.as_ref(),
            load_inputs: &[],
            name: source.file_name(),
        };
        self.run_group(group, &FormatArgs::new(), plan)
    }

    pub fn report(&self) -> &Report {
        self.reporter.report()
    }

    pub fn finish(self) -> Report {
        self.reporter.finish()
    }

    fn run_group(&mut self, group: Group<'_>, title: &FormatArgs, plan: TestPlan) -> Result<GroupSummary> {
        let TestPlan {
            cases,
            reference,
            strategy,
            alternates,
            probes,
            extractors,
            output_validator,
            options,
        } = plan;
        let strategy = strategy.as_ref();
        let presenter = strategy.presenter();
        let mode = group.mode;

        let prepared = precompute(cases.into_cases(), reference.as_ref(), |args| strategy.clone_arguments(args))?;

        self.reporter.use_catalog(
            defaults::catalog_for(mode).with_overrides(&options.messages),
            &options.locale,
        );
        self.reporter.open_group_from(mode.title_key(), title);
        info!(mode = ?mode, name = group.name, cases = prepared.len(), "Running test group");

        let mut summary = GroupSummary {
            cases: prepared.len(),
            ..GroupSummary::default()
        };
        let mut tracker = RecurrenceTracker::default();
        let mut capture = CaptureStream::new();

        for (index, prepared_case) in prepared.iter().enumerate() {
            let case = &prepared_case.case;
            let expected = &prepared_case.expected;
            self.reporter.open_run();
            strategy.on_new_case(&case.arguments, &case.inputs);

            let execution = run_case(
                group.source,
                group.load_inputs,
                group.target,
                case,
                options.repeat,
                &mut capture,
                |args| strategy.clone_arguments(args),
            );
            let has_inputs = !case.inputs.is_empty();
            let mut args = FormatArgs::new()
                .with("name", group.name)
                .with("args", presenter.arguments(&execution.stored_args))
                .with("inputs", presenter.inputs(&case.inputs))
                .with("output", execution.outcome.output());
            if mode == TestMode::Function {
                args.set("call", presenter.call(group.name, &execution.stored_args));
            }

            let (value, output) = match execution.outcome {
                ExecutionOutcome::Fault { fault, .. } => {
                    summary.faulted += 1;
                    debug!(case = index + 1, fault = %fault, "Case faulted");
                    args.set("ename", fault.name());
                    args.set("emsg", fault.message.as_str());
                    self.reporter
                        .append_or(fault.name(), Some("GenericErrorMsg"), Severity::Error, &args);
                    if let Some(location) = &fault.location {
                        let line_args = args
                            .clone()
                            .with("lineno", location.line.to_string())
                            .with("line", location.text.as_str());
                        self.reporter.append("PrintExcLine", Severity::Debug, &line_args);
                    }
                    self.append_vectors(mode, has_inputs, &args);
                    continue;
                }
                ExecutionOutcome::Success { value, output } => (value, output),
            };

            let parsed = match strategy.parse_output(&output) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(case = index + 1, reason = %e, "Output could not be parsed");
                    args.set("reason", e.reason.as_str());
                    args.set("pattern", strategy.output_pattern());
                    self.reporter.append("OutputParseError", Severity::Incorrect, &args);
                    self.append_vectors(mode, has_inputs, &args);
                    self.reporter.append("OutputPatternInfo", Severity::Info, &args);
                    self.reporter.append("PrintStudentOutput", Severity::Debug, &args);
                    continue;
                }
            };
            if !options.hide_output {
                self.reporter.append("PrintStudentOutput", Severity::Info, &args);
            }

            let result = strategy.extract_result(&execution.arguments, value, &parsed);
            let recurrence_value = (mode != TestMode::Program).then_some(&result);
            let repeats = options.test_recurrence && tracker.repeats(recurrence_value, &parsed);

            if mode == TestMode::Snippet {
                args.set("res", presenter.variables(&result));
                args.set("ref", presenter.variables(expected));
            } else {
                args.set("res", presenter.result(&result));
                args.set("ref", presenter.reference(expected));
            }
            args.set("parsed", presenter.parsed(&parsed));

            match strategy.validate(mode, expected, &result, &parsed) {
                Ok(()) => {
                    summary.passed += 1;
                    self.reporter.append("CorrectResult", Severity::Correct, &args);
                    self.append_vectors(mode, has_inputs, &args);
                    self.reporter.append("PrintStudentResult", Severity::Debug, &args);
                    if repeats {
                        self.reporter.append("RepeatingResult", Severity::Info, &args);
                    }
                }
                Err(mismatch) => {
                    let key = mismatch.reason.as_deref().unwrap_or("IncorrectResult");
                    self.reporter
                        .append_or(key, Some("IncorrectResult"), Severity::Incorrect, &args);
                    self.append_vectors(mode, has_inputs, &args);
                    self.reporter.append("PrintStudentResult", Severity::Debug, &args);
                    if mode != TestMode::Function && options.hide_output && !output.is_empty() {
                        self.reporter.append("PrintStudentOutput", Severity::Debug, &args);
                    }
                    self.reporter.append("PrintReference", Severity::Debug, &args);

                    let context = CaseContext {
                        index,
                        arguments: &execution.stored_args,
                        inputs: &case.inputs,
                        expected,
                        result: &result,
                        parsed: &parsed,
                        output: &output,
                    };
                    let diagnostics = Diagnostics {
                        alternates: &alternates,
                        probes: &probes,
                        extractors: &extractors,
                        repeats,
                    };
                    self.diagnose(mode, strategy, &diagnostics, &context, &args)?;
                }
            }

            if let Some(validator) = &output_validator {
                match validator.validate(&output, &execution.stored_args, &case.inputs) {
                    Ok(()) => {
                        self.reporter.append("CorrectMessage", Severity::Correct, &args);
                    }
                    Err(mismatch) => {
                        let key = mismatch.reason.as_deref().unwrap_or("IncorrectMessage");
                        self.reporter
                            .append_or(key, Some("IncorrectMessage"), Severity::Incorrect, &args);
                        self.reporter.append("MessageInfo", Severity::Info, &args);
                        if options.hide_output {
                            self.reporter.append("PrintStudentOutput", Severity::Info, &args);
                        }
                    }
                }
            }

            tracker.record(recurrence_value, &parsed);
        }

        info!(
            mode = ?mode,
            name = group.name,
            passed = summary.passed,
            faulted = summary.faulted,
            cases = summary.cases,
            "Test group finished"
        );
        Ok(summary)
    }

    fn append_vectors(&mut self, mode: TestMode, has_inputs: bool, args: &FormatArgs) {
        if mode == TestMode::Function {
            self.reporter.append("PrintTestVector", Severity::Debug, args);
        }
        if has_inputs {
            self.reporter.append("PrintInputVector", Severity::Debug, args);
        }
    }

    /// Secondary checks for a failed case, each independent of the others.
    fn diagnose(
        &mut self,
        mode: TestMode,
        strategy: &dyn Strategy,
        diagnostics: &Diagnostics<'_>,
        context: &CaseContext<'_>,
        args: &FormatArgs,
    ) -> Result<()> {
        let mut header = SectionHeader::new("AdditionalTests");

        for alternate in diagnostics.alternates {
            let alternate_expected =
                alternate.evaluate(context.index, strategy.clone_arguments(context.arguments), context.inputs)?;
            if strategy
                .validate(mode, &alternate_expected, context.result, context.parsed)
                .is_ok()
            {
                debug!(alternate = alternate.name(), "Result matches alternate reference");
                header.emit(&mut self.reporter, args);
                self.reporter.append(alternate.name(), Severity::Info, args);
            }
        }

        for probe in diagnostics.probes {
            if let Err(mismatch) = probe.probe(context) {
                header.emit(&mut self.reporter, args);
                let key = mismatch.reason.as_deref().unwrap_or(probe.name());
                self.reporter.append(key, Severity::Info, args);
            }
        }

        if diagnostics.repeats {
            header.emit(&mut self.reporter, args);
            self.reporter.append("RepeatingResult", Severity::Info, args);
        }

        let mut info_header = SectionHeader::new("AdditionalInfo");
        for extractor in diagnostics.extractors {
            if let Ok(info) = extractor.extract(context) {
                info_header.emit(&mut self.reporter, args);
                let info_args = args.clone().with("func_res", info);
                self.reporter.append(extractor.name(), Severity::Info, &info_args);
            }
        }
        Ok(())
    }
}

struct Group<'a> {
    mode: TestMode,
    target: Target<'a>,
    source: &'a dyn CandidateSource,
    load_inputs: &'a [String],
    name: &'a str,
}

struct Diagnostics<'a> {
    alternates: &'a [Box<dyn Oracle>],
    probes: &'a [Box<dyn Probe>],
    extractors: &'a [Box<dyn InfoExtractor>],
    repeats: bool,
}

/// INFO header emitted once, right before the first entry of its section.
struct SectionHeader {
    key: &'static str,
    emitted: bool,
}

impl SectionHeader {
    fn new(key: &'static str) -> Self {
        Self { key, emitted: false }
    }

    fn emit(&mut self, reporter: &mut Reporter, args: &FormatArgs) {
        if !self.emitted {
            reporter.append(self.key, Severity::Info, args);
            self.emitted = true;
        }
    }
}
