/// Checker Runner
///
/// **Core Responsibility:**
/// Turn a declarative checker definition into harness calls: load the
/// submission once, then run every listed test group in order.
///
/// **Critical Properties:**
/// - Checker mistakes (missing expectations, bad patterns, unknown
///   references) are `HarnessError`s, never student-facing events
/// - A submission that fails to load skips the function and program
///   groups; snippet groups still run
/// - Message overrides apply checker-wide first, then per group

use crate::config::LanguageConfig;
use crate::error::{HarnessError, Result};
use crate::harness::{GroupSummary, Harness, Strategy, TestMode, TestPlan};
use crate::loader::LoadOptions;
use crate::oracle::{Oracle, TableOracle, TestCase};
use crate::parser::{OutputParser, ParseError, PatternParser, RawOutput};
use crate::presenter::{DefaultPresenter, Presenter};
use crate::process::{ProcessEngine, ProcessOracle, ProcessSource, SnippetSource};
use crate::validation::{validator_for, OutputPattern, Validator, Verdict};
use senpai_common::checker::{
    CaseSpec, CheckerSpec, MessageOverrides, ReferenceSpec, TestOptionsSpec, TestSpec,
};
use senpai_common::types::Report;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One grading request against a checker definition.
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    pub checker: &'a CheckerSpec,
    pub submission: &'a Path,
    pub locale: &'a str,
    pub language: &'a LanguageConfig,
    /// Directory relative reference paths are resolved against.
    pub base_dir: &'a Path,
}

/// Report plus per-group counts, in checker order.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub report: Report,
    pub groups: Vec<GroupSummary>,
    pub loaded: bool,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.loaded && self.report.passed()
    }
}

/// Strategy assembled from a test's declarative options.
pub struct ConfiguredStrategy {
    validator: Option<Box<dyn Validator>>,
    parser: Option<Arc<PatternParser>>,
    presenter: DefaultPresenter,
}

impl ConfiguredStrategy {
    pub fn from_options(options: &TestOptionsSpec, highlight: Option<&str>) -> Result<Self> {
        Ok(Self {
            validator: options.validator.map(validator_for),
            parser: pattern_parser(options)?,
            presenter: DefaultPresenter {
                highlight: highlight.map(str::to_string),
            },
        })
    }

    fn output_parser(&self) -> Option<Arc<dyn OutputParser>> {
        self.parser.clone().map(|parser| parser as Arc<dyn OutputParser>)
    }
}

fn pattern_parser(options: &TestOptionsSpec) -> Result<Option<Arc<PatternParser>>> {
    Ok(options
        .parser
        .as_ref()
        .map(PatternParser::from_spec)
        .transpose()?
        .map(Arc::new))
}

impl Strategy for ConfiguredStrategy {
    fn validate(&self, mode: TestMode, expected: &Value, result: &Value, parsed: &Value) -> Verdict {
        match &self.validator {
            Some(validator) => validator.validate(expected, result, parsed),
            None => mode.default_validator().validate(expected, result, parsed),
        }
    }

    fn parse_output(&self, output: &str) -> std::result::Result<Value, ParseError> {
        match &self.parser {
            Some(parser) => parser.parse(output),
            None => RawOutput.parse(output),
        }
    }

    fn output_pattern(&self) -> String {
        self.parser.as_ref().map(|parser| parser.pattern()).unwrap_or_default()
    }

    fn presenter(&self) -> &dyn Presenter {
        &self.presenter
    }
}

/// Merge `extra` over `base`; a key present in both takes `extra`'s patch.
pub fn merge_overrides(base: &MessageOverrides, extra: &MessageOverrides) -> MessageOverrides {
    let mut merged = base.clone();
    for (locale, patches) in extra {
        let entries = merged.entry(locale.clone()).or_default();
        for (key, patch) in patches {
            entries.insert(key.clone(), patch.clone());
        }
    }
    merged
}

/// Run every test of the checker against the submission.
#[instrument(skip(request), fields(tester = %request.checker.tester, language = %request.language.name, locale = request.locale))]
pub fn run_checker(request: &CheckRequest<'_>) -> Result<CheckOutcome> {
    let checker = request.checker;
    let engine = Arc::new(ProcessEngine::new(request.language.clone()));
    let mut harness = Harness::new(&checker.tester);
    let mut groups = Vec::new();

    let needs_module = checker
        .tests
        .iter()
        .any(|test| !matches!(test, TestSpec::Snippet(_)));
    let handle = if needs_module {
        let options = LoadOptions {
            locale: request.locale.to_string(),
            inputs: checker.load.inputs.clone(),
            hide_output: checker.load.hide_output,
            allow_output: checker.load.allow_output,
            extension: Some(request.language.file_extension.clone()),
            reserved_names: request.language.reserved_names.clone(),
            messages: merge_overrides(&checker.messages, &checker.load.messages),
        };
        let source = Arc::new(ProcessSource::new(request.submission, engine.clone()));
        let handle = harness.load_module(source, &options);
        if handle.is_none() {
            warn!(submission = %request.submission.display(), "Submission did not load; skipping module tests");
        }
        handle
    } else {
        None
    };
    let loaded = !needs_module || handle.is_some();

    for (index, test) in checker.tests.iter().enumerate() {
        let builder = PlanBuilder {
            request,
            engine: &engine,
            index,
        };
        let summary = match test {
            TestSpec::Function(spec) => {
                let Some(handle) = &handle else { continue };
                let function = spec
                    .name
                    .for_locale(request.locale)
                    .ok_or_else(|| builder.invalid("function name has no translations"))?;
                let plan = builder.plan(
                    TestMode::Function,
                    &spec.options,
                    cases_from(&spec.cases),
                    builder.reference(TestMode::Function, spec.reference.as_ref(), Some(function), &spec.options, || {
                        expected_from(&spec.cases)
                    })?,
                    Some(function),
                )?;
                harness.test_function(handle, function, plan)?
            }
            TestSpec::Program(spec) => {
                let Some(handle) = &handle else { continue };
                let plan = builder.plan(
                    TestMode::Program,
                    &spec.options,
                    cases_from(&spec.cases),
                    builder.reference(TestMode::Program, spec.reference.as_ref(), None, &spec.options, || {
                        expected_from(&spec.cases)
                    })?,
                    None,
                )?;
                harness.test_program(handle, plan)?
            }
            TestSpec::Snippet(spec) => {
                let body = fs::read_to_string(request.submission)?;
                let file_name = request
                    .submission
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("snippet{}", request.language.file_extension));
                let source = SnippetSource::new(&file_name, &spec.prelude, &body, &spec.postlude, engine.clone())?;
                let plan = builder.plan(
                    TestMode::Snippet,
                    &spec.options,
                    vec![TestCase::new(Vec::new(), spec.inputs.clone())],
                    builder.reference(TestMode::Snippet, spec.reference.as_ref(), None, &spec.options, || {
                        spec.expected.clone().map(|expected| vec![expected])
                    })?,
                    None,
                )?;
                harness.test_snippet(Arc::new(source), plan)?
            }
        };
        groups.push(summary);
    }

    let report = harness.finish();
    info!(groups = groups.len(), loaded, passed = report.passed(), "Checker finished");
    Ok(CheckOutcome {
        report,
        groups,
        loaded,
    })
}

fn cases_from(cases: &[CaseSpec]) -> Vec<TestCase> {
    cases
        .iter()
        .map(|case| TestCase::new(case.arguments.clone(), case.inputs.clone()))
        .collect()
}

/// `None` unless every case lists its expected value.
fn expected_from(cases: &[CaseSpec]) -> Option<Vec<Value>> {
    cases.iter().map(|case| case.expected.clone()).collect()
}

struct PlanBuilder<'a> {
    request: &'a CheckRequest<'a>,
    engine: &'a Arc<ProcessEngine>,
    index: usize,
}

impl PlanBuilder<'_> {
    fn invalid(&self, reason: &str) -> HarnessError {
        HarnessError::Checker(format!("test {}: {}", self.index + 1, reason))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.request.base_dir.join(path)
        }
    }

    fn process_oracle(
        &self,
        mode: TestMode,
        name: &str,
        reference: &ReferenceSpec,
        function: Option<&str>,
        parser: Option<Arc<dyn OutputParser>>,
    ) -> Result<ProcessOracle> {
        let path = self.resolve(&reference.path);
        let engine = self.engine.clone();
        Ok(match mode {
            TestMode::Function => {
                let function = reference
                    .function
                    .as_deref()
                    .or(function)
                    .ok_or_else(|| self.invalid("reference has no function to call"))?;
                ProcessOracle::function(name, path, function, engine)
            }
            TestMode::Program => ProcessOracle::program(name, path, parser, engine),
            TestMode::Snippet => ProcessOracle::snippet(name, path, engine),
        })
    }

    fn reference<F>(
        &self,
        mode: TestMode,
        reference: Option<&ReferenceSpec>,
        function: Option<&str>,
        options: &TestOptionsSpec,
        table: F,
    ) -> Result<Box<dyn Oracle>>
    where
        F: FnOnce() -> Option<Vec<Value>>,
    {
        match reference {
            Some(reference) => {
                let parser = pattern_parser(options)?.map(|parser| parser as Arc<dyn OutputParser>);
                let name = reference.name.as_deref().unwrap_or("reference");
                Ok(Box::new(self.process_oracle(mode, name, reference, function, parser)?))
            }
            None => {
                let expected = table().ok_or_else(|| self.invalid("cases need expected values or a reference"))?;
                Ok(Box::new(TableOracle::new("expected", expected)))
            }
        }
    }

    fn plan(
        &self,
        mode: TestMode,
        options: &TestOptionsSpec,
        cases: Vec<TestCase>,
        reference: Box<dyn Oracle>,
        function: Option<&str>,
    ) -> Result<TestPlan> {
        let highlight = self.request.language.highlight.as_deref();
        let strategy = ConfiguredStrategy::from_options(options, highlight)?;
        let mut plan = TestPlan::with_reference(cases, reference)
            .locale(self.request.locale)
            .repeat(options.repeat)
            .recurrence(options.test_recurrence)
            .hide_output(options.hide_output)
            .messages(merge_overrides(&self.request.checker.messages, &options.messages));

        for (position, alternate) in options.alternates.iter().enumerate() {
            let name = alternate
                .name
                .clone()
                .unwrap_or_else(|| format!("alternate_{}", position + 1));
            plan = plan.alternate(self.process_oracle(mode, &name, alternate, function, strategy.output_parser())?);
        }
        if let Some(check) = &options.output_check {
            plan = plan.output_validator(OutputPattern::from_spec(check)?);
        }
        Ok(plan.strategy(strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use senpai_common::checker::MessagePatch;
    use std::collections::BTreeMap;

    fn make_overrides(locale: &str, key: &str, content: &str) -> MessageOverrides {
        let mut patches = BTreeMap::new();
        patches.insert(key.to_string(), MessagePatch::Content(content.to_string()));
        let mut overrides = MessageOverrides::new();
        overrides.insert(locale.to_string(), patches);
        overrides
    }

    #[test]
    fn test_merge_overrides_prefers_group_level() {
        let base = make_overrides("en", "IncorrectResult", "base");
        let mut extra = make_overrides("en", "IncorrectResult", "group");
        extra.extend(make_overrides("fi", "CorrectResult", "oikein"));
        let merged = merge_overrides(&base, &extra);
        assert_eq!(
            merged["en"]["IncorrectResult"],
            MessagePatch::Content("group".to_string())
        );
        assert!(merged["fi"].contains_key("CorrectResult"));
    }

    #[test]
    fn test_expected_requires_every_case() {
        let complete = vec![
            CaseSpec {
                expected: Some(serde_json::json!(1)),
                ..CaseSpec::default()
            },
            CaseSpec {
                expected: Some(serde_json::json!(2)),
                ..CaseSpec::default()
            },
        ];
        assert_eq!(expected_from(&complete).unwrap().len(), 2);
        let partial = vec![complete[0].clone(), CaseSpec::default()];
        assert!(expected_from(&partial).is_none());
    }

    #[test]
    fn test_configured_strategy_uses_parser_and_validator() {
        let options: TestOptionsSpec = serde_json::from_value(serde_json::json!({
            "validator": "rounding_float",
            "parser": {"pattern": "Total: (\\d+[.,]\\d+)", "kinds": ["float"]}
        }))
        .unwrap();
        let strategy = ConfiguredStrategy::from_options(&options, Some("python3")).unwrap();
        assert_eq!(strategy.parse_output("Total: 2,50").unwrap(), serde_json::json!(2.5));
        assert!(strategy.parse_output("nothing").is_err());
        assert_eq!(strategy.output_pattern(), "Total: (\\d+[.,]\\d+)");
        assert!(strategy
            .validate(TestMode::Function, &serde_json::json!(1.004), &serde_json::json!(1.0), &Value::Null)
            .is_ok());
        assert_eq!(strategy.presenter().highlight(), Some("python3"));
    }

    #[test]
    fn test_bad_pattern_is_a_checker_error() {
        let options: TestOptionsSpec = serde_json::from_value(serde_json::json!({
            "parser": {"pattern": "(unclosed"}
        }))
        .unwrap();
        assert!(matches!(
            ConfiguredStrategy::from_options(&options, None),
            Err(HarnessError::Pattern(_))
        ));
    }
}
