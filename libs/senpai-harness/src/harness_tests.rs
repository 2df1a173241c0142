/// Scenario tests for the full grading pipeline
///
/// These tests drive complete sessions through `Harness` and check the
/// report a student would see:
/// 1. Verdicts, vectors and recurrence for passing cases
/// 2. Faults and parse failures stay inside their own case
/// 3. References never see the candidate's mutations
/// 4. Secondary diagnostics appear only for failures, in a fixed order
/// 5. Output checks, snippets, locales and message overrides
/// 6. A checker definition run end to end through a process runner

#[cfg(test)]
mod pipeline_tests {
    use crate::candidate::NativeModule;
    use crate::fault::{Fault, FaultKind};
    use crate::harness::{Harness, Strategy, TestMode, TestPlan};
    use crate::loader::{CandidateHandle, LoadOptions};
    use crate::oracle::{CaseSource, FnOracle, TableOracle, TestCase};
    use crate::parser::{OutputParser, ParseError, PatternParser};
    use crate::validation::{ensure, CaseContext, FnExtractor, FnProbe, Mismatch, NoInfo, OutputPattern, Verdict};
    use crate::HarnessError;
    use senpai_common::checker::{MessageOverrides, MessagePatch, ValueKind};
    use senpai_common::types::{Report, Run, Severity, TestGroup};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use Severity::{Correct, Debug, Error, Incorrect, Info};

    fn make_double(offset: i64, factor: i64) -> NativeModule {
        NativeModule::new("answer.py").function("double", move |_, args, _| {
            match args.first().and_then(Value::as_i64) {
                Some(n) => Ok(json!(n * factor + offset)),
                None => Err(Fault::new(
                    FaultKind::Type,
                    "unsupported operand type(s) for *: 'str' and 'int'",
                )),
            }
        })
    }

    fn double_reference() -> FnOracle {
        FnOracle::positional("double", |args| {
            args[0].as_i64().map(|n| json!(n * 2)).unwrap_or(Value::Null)
        })
    }

    fn int_cases(values: &[Value]) -> Vec<TestCase> {
        values.iter().map(|v| TestCase::args(vec![v.clone()])).collect()
    }

    fn load(harness: &mut Harness, module: NativeModule, options: &LoadOptions) -> CandidateHandle {
        harness
            .load_module(Arc::new(module), options)
            .expect("candidate should load")
    }

    fn overrides(entries: &[(&str, &str)]) -> MessageOverrides {
        let patches = entries
            .iter()
            .map(|(key, content)| (key.to_string(), MessagePatch::Content(content.to_string())))
            .collect::<BTreeMap<_, _>>();
        let mut messages = MessageOverrides::new();
        messages.insert("en".to_string(), patches);
        messages
    }

    fn severities(run: &Run) -> Vec<Severity> {
        run.output.iter().map(|m| m.severity).collect()
    }

    fn contents(run: &Run) -> Vec<&str> {
        run.output.iter().map(|m| m.content.as_str()).collect()
    }

    fn group<'a>(report: &'a Report, title_prefix: &str) -> &'a TestGroup {
        report
            .groups
            .iter()
            .find(|g| g.title.starts_with(title_prefix))
            .unwrap_or_else(|| panic!("no group starting with {:?} in {:?}", title_prefix, report.groups))
    }

    fn run_doubling(recurrence: bool) -> Report {
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, make_double(0, 2), &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(1), json!(2), json!(2)]), double_reference()).recurrence(recurrence);
        let summary = harness.test_function(&handle, "double", plan).unwrap();
        assert_eq!(summary.passed, 3);
        assert!(summary.all_passed());
        harness.finish()
    }

    #[test]
    fn test_all_correct_with_repeated_result_flagged() {
        let report = run_doubling(true);
        assert_eq!(report.groups.len(), 2);
        assert!(report.groups[0].runs.is_empty(), "clean load reports nothing");

        let tests = group(&report, "Testing function double");
        assert_eq!(tests.runs.len(), 3);
        assert_eq!(severities(&tests.runs[0]), vec![Correct, Debug, Debug]);
        assert_eq!(severities(&tests.runs[1]), vec![Correct, Debug, Debug]);
        assert_eq!(severities(&tests.runs[2]), vec![Correct, Debug, Debug, Info]);
        assert!(tests.runs[2].output[3].content.contains("same result"));
        assert!(!tests.runs[2].output[3].hints.is_empty());
        assert!(tests.runs[0].output[1].content.contains("double(1)"));
        assert!(report.passed());
    }

    #[test]
    fn test_recurrence_can_be_disabled() {
        let report = run_doubling(false);
        let tests = group(&report, "Testing function double");
        assert!(tests.runs.iter().all(|run| severities(run) == vec![Correct, Debug, Debug]));
    }

    #[test]
    fn test_fault_is_confined_to_its_case() {
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, make_double(0, 2), &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(1), json!("x"), json!(3)]), double_reference());
        let summary = harness.test_function(&handle, "double", plan).unwrap();
        assert_eq!(summary.faulted, 1);
        assert_eq!(summary.passed, 2);

        let report = harness.finish();
        let tests = group(&report, "Testing function double");
        assert_eq!(tests.runs.len(), 3);
        assert_eq!(severities(&tests.runs[1]), vec![Error, Debug]);
        assert!(tests.runs[1].output[0].content.contains("unsupported operand"));
        for run in [&tests.runs[0], &tests.runs[2]] {
            assert!(!severities(run).contains(&Error));
            assert_eq!(run.output[0].severity, Correct);
        }
        assert!(!report.passed());
    }

    #[test]
    fn test_missing_function_is_reported_per_case() {
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, make_double(0, 2), &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(1)]), double_reference());
        harness.test_function(&handle, "triple", plan).unwrap();
        let report = harness.finish();
        let run = &group(&report, "Testing function triple").runs[0];
        assert_eq!(run.output[0].severity, Error);
        assert!(run.output[0].content.contains("no attribute 'triple'"));
    }

    #[test]
    fn test_reserved_name_yields_single_error() {
        let mut harness = Harness::new("doubling");
        let options = LoadOptions {
            extension: Some(".py".to_string()),
            reserved_names: vec!["math".to_string()],
            ..LoadOptions::default()
        };
        let module = NativeModule::new("math.py").function("double", |_, args, _| Ok(args[0].clone()));
        assert!(harness.load_module(Arc::new(module), &options).is_none());

        let report = harness.finish();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].runs.len(), 1);
        assert_eq!(severities(&report.groups[0].runs[0]), vec![Error]);
        assert!(report.groups[0].runs[0].output[0].content.contains("math"));
    }

    struct ResultParser {
        parser: PatternParser,
    }

    impl Strategy for ResultParser {
        fn parse_output(&self, output: &str) -> Result<Value, ParseError> {
            self.parser.parse(output)
        }

        fn output_pattern(&self) -> String {
            self.parser.pattern()
        }
    }

    fn make_program() -> NativeModule {
        NativeModule::new("prog.py").top_level(|_, io| {
            let n: i64 = io.read_line()?.trim().parse().map_err(|_| {
                Fault::new(FaultKind::Value, "invalid literal for int()")
            })?;
            if n == 0 {
                io.print("oops");
            } else {
                io.print(format!("Result: {}", n * 2));
            }
            Ok(())
        })
    }

    #[test]
    fn test_parse_failure_is_confined_to_its_case() {
        let mut harness = Harness::new("program");
        let options = LoadOptions {
            inputs: vec!["5".to_string()],
            ..LoadOptions::default()
        };
        let handle = load(&mut harness, make_program(), &options);
        let strategy = ResultParser {
            parser: PatternParser::new(r"Result: (-?\d+)")
                .unwrap()
                .kinds(vec![ValueKind::Integer]),
        };
        let reference = FnOracle::with_inputs("program", |_, inputs| {
            json!(inputs[0].parse::<i64>().unwrap_or(0) * 2)
        });
        let cases = vec![TestCase::inputs(["1"]), TestCase::inputs(["0"]), TestCase::inputs(["3"])];
        let summary = harness
            .test_program(&handle, TestPlan::new(cases, reference).strategy(strategy))
            .unwrap();
        assert_eq!(summary.passed, 2);

        let report = harness.finish();
        let tests = group(&report, "Testing program prog");
        assert_eq!(severities(&tests.runs[0]), vec![Correct, Debug, Debug]);
        assert_eq!(severities(&tests.runs[1]), vec![Incorrect, Debug, Info, Debug]);
        let failed = contents(&tests.runs[1]);
        assert!(failed[0].contains("could not be interpreted"));
        assert!(failed[2].contains(r"Result: (-?\d+)"));
        assert!(failed[3].contains("oops"));
        assert_eq!(severities(&tests.runs[2]), vec![Correct, Debug, Debug]);
    }

    #[test]
    fn test_parse_failure_with_visible_output_keeps_verdict_first() {
        let mut harness = Harness::new("program");
        let options = LoadOptions {
            inputs: vec!["5".to_string()],
            ..LoadOptions::default()
        };
        let handle = load(&mut harness, make_program(), &options);
        let strategy = ResultParser {
            parser: PatternParser::new(r"Result: (-?\d+)")
                .unwrap()
                .kinds(vec![ValueKind::Integer]),
        };
        let reference = FnOracle::with_inputs("program", |_, inputs| {
            json!(inputs[0].parse::<i64>().unwrap_or(0) * 2)
        });
        let cases = vec![TestCase::inputs(["0"]), TestCase::inputs(["2"])];
        let plan = TestPlan::new(cases, reference).strategy(strategy).hide_output(false);
        harness.test_program(&handle, plan).unwrap();

        let report = harness.finish();
        let tests = group(&report, "Testing program prog");
        assert_eq!(severities(&tests.runs[0]), vec![Incorrect, Debug, Info, Debug]);
        assert_eq!(severities(&tests.runs[1])[0], Info);
        assert!(tests.runs[1].output[0].content.contains("Result: 4"));
        assert_eq!(severities(&tests.runs[1])[1], Correct);
    }

    #[test]
    fn test_program_repeat_feeds_inputs_each_time() {
        let mut harness = Harness::new("program");
        let options = LoadOptions {
            inputs: vec!["5".to_string()],
            ..LoadOptions::default()
        };
        let handle = load(&mut harness, make_program(), &options);
        let reference = TableOracle::new("table", vec![json!("Result: 8\nResult: 8\n")]);
        let plan = TestPlan::new(vec![TestCase::inputs(["4"])], reference).repeat(2);
        let summary = harness.test_program(&handle, plan).unwrap();
        assert_eq!(summary.passed, 1);
    }

    struct SortedArgument;

    impl Strategy for SortedArgument {
        fn extract_result(&self, arguments: &[Value], _result: Value, _parsed: &Value) -> Value {
            arguments[0].clone()
        }
    }

    #[test]
    fn test_reference_and_display_are_isolated_from_mutation() {
        let module = NativeModule::new("answer.py").function("sort_in_place", |_, args, _| {
            if let Some(items) = args[0].as_array_mut() {
                items.sort_by_key(|v| v.as_i64().unwrap_or(0));
            }
            Ok(Value::Null)
        });
        let reference = FnOracle::positional("sort_in_place", |mut args| {
            let mut items = args[0].as_array().cloned().unwrap_or_default();
            items.sort_by_key(|v| v.as_i64().unwrap_or(0));
            args[0] = json!(["clobbered"]);
            Value::Array(items)
        });

        let mut harness = Harness::new("sorting");
        let handle = load(&mut harness, module, &LoadOptions::default());
        let plan = TestPlan::new(vec![TestCase::args(vec![json!([3, 1, 2])])], reference).strategy(SortedArgument);
        let summary = harness.test_function(&handle, "sort_in_place", plan).unwrap();
        assert_eq!(summary.passed, 1);

        let report = harness.finish();
        let run = &group(&report, "Testing function sort_in_place").runs[0];
        assert!(run.output[1].content.contains("sort_in_place([3,1,2])"));
        assert!(run.output[2].content.contains("1 2 3"));
    }

    #[test]
    fn test_unknown_fault_and_reason_fall_back() {
        let module = NativeModule::new("answer.py").function("ratio", |_, args, _| {
            match args[1].as_f64() {
                Some(d) if d != 0.0 => Ok(json!(args[0].as_f64().unwrap_or(0.0) / d)),
                _ => Err(Fault::new(FaultKind::Other("ZeroDivisionError".into()), "division by zero")),
            }
        });
        struct NegativeCheck;
        impl Strategy for NegativeCheck {
            fn validate(&self, mode: TestMode, expected: &Value, result: &Value, parsed: &Value) -> Verdict {
                ensure(result.as_f64().unwrap_or(0.0) >= 0.0, Some("fail_negative"))?;
                mode.default_validator().validate(expected, result, parsed)
            }
        }
        let cases = vec![
            TestCase::args(vec![json!(1.0), json!(0.0)]),
            TestCase::args(vec![json!(-1.0), json!(2.0)]),
        ];
        let table = || TableOracle::new("table", vec![json!(0.5), json!(0.5)]);

        let mut harness = Harness::new("ratio");
        let handle = load(&mut harness, module, &LoadOptions::default());
        harness
            .test_function(&handle, "ratio", TestPlan::new(cases.clone(), table()).strategy(NegativeCheck))
            .unwrap();
        harness
            .test_function(
                &handle,
                "ratio",
                TestPlan::new(cases, table())
                    .strategy(NegativeCheck)
                    .messages(overrides(&[("fail_negative", "The ratio should never be negative.")])),
            )
            .unwrap();
        let report = harness.finish();

        let plain = &report.groups[1];
        assert!(plain.runs[0].output[0].content.contains("ZeroDivisionError: division by zero"));
        assert_eq!(plain.runs[1].output[0].content, "Your function returned an incorrect result.");
        let custom = &report.groups[2];
        assert_eq!(custom.runs[1].output[0].content, "The ratio should never be negative.");
    }

    #[test]
    fn test_failure_diagnostics_order() {
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, make_double(2, 1), &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(1), json!(3)]), double_reference())
            .alternate(FnOracle::positional("plus_two", |args| {
                json!(args[0].as_i64().unwrap_or(0) + 2)
            }))
            .alternate(FnOracle::positional("squared", |args| {
                json!(args[0].as_i64().unwrap_or(0).pow(2))
            }))
            .probe(FnProbe::new("fail_odd", |case: &CaseContext<'_>| {
                ensure(case.result.as_i64().unwrap_or(0) % 2 == 0, None)
            }))
            .probe(FnProbe::new("fail_never", |_: &CaseContext<'_>| Ok(())))
            .extractor(FnExtractor::new("ShowDifference", |case: &CaseContext<'_>| {
                let diff = case.result.as_i64().unwrap_or(0) - case.expected.as_i64().unwrap_or(0);
                Ok(diff.to_string())
            }))
            .extractor(FnExtractor::new("Nothing", |_: &CaseContext<'_>| Err(NoInfo)))
            .messages(overrides(&[
                ("plus_two", "Your function adds two instead of doubling."),
                ("squared", "Your function squares the argument."),
                ("fail_odd", "Doubling never gives an odd number."),
                ("ShowDifference", "Off by {func_res}."),
            ]));
        harness.test_function(&handle, "double", plan).unwrap();

        let report = harness.finish();
        let run = &group(&report, "Testing function double").runs[0];
        assert_eq!(
            severities(run),
            vec![Incorrect, Debug, Debug, Debug, Info, Info, Info, Info, Info]
        );
        let text = contents(run);
        assert_eq!(text[0], "Your function returned an incorrect result.");
        assert!(text[3].starts_with("Expected result:"));
        assert!(text[4].starts_with("Further tests"));
        assert_eq!(text[5], "Your function adds two instead of doubling.");
        assert_eq!(text[6], "Doubling never gives an odd number.");
        assert!(text[7].starts_with("Additional information"));
        assert_eq!(text[8], "Off by 1.");
    }

    #[test]
    fn test_silent_diagnostics_emit_no_headers() {
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, make_double(1, 2), &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(2)]), double_reference())
            .alternate(FnOracle::positional("plus_two", |args| {
                json!(args[0].as_i64().unwrap_or(0) + 2)
            }))
            .probe(FnProbe::new("fail_never", |_: &CaseContext<'_>| Ok(())));
        harness.test_function(&handle, "double", plan).unwrap();
        let report = harness.finish();
        let run = &group(&report, "Testing function double").runs[0];
        assert_eq!(severities(run), vec![Incorrect, Debug, Debug, Debug]);
    }

    #[test]
    fn test_repeated_wrong_result_is_a_diagnostic() {
        let module = NativeModule::new("answer.py").function("double", |_, _, _| Ok(json!(4)));
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, module, &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(2), json!(5)]), double_reference())
            .probe(FnProbe::new("fail_never", |_: &CaseContext<'_>| Ok(())));
        harness.test_function(&handle, "double", plan).unwrap();
        let report = harness.finish();
        let tests = group(&report, "Testing function double");
        assert_eq!(severities(&tests.runs[0]), vec![Correct, Debug, Debug]);
        let text = contents(&tests.runs[1]);
        assert_eq!(severities(&tests.runs[1]), vec![Incorrect, Debug, Debug, Debug, Info, Info]);
        assert!(text[4].starts_with("Further tests"));
        assert!(text[5].contains("same result"));
    }

    #[test]
    fn test_output_validator_runs_after_verdict() {
        let module = NativeModule::new("answer.py").function("greet", |_, args, io| {
            let name = args[0].as_str().unwrap_or_default().to_string();
            if name != "nobody" {
                io.print(format!("Hello {}!", name));
            }
            Ok(Value::Null)
        });
        let mut harness = Harness::new("greeting");
        let handle = load(&mut harness, module, &LoadOptions::default());
        let plan = TestPlan::new(
            int_cases(&[json!("Ada"), json!("nobody")]),
            FnOracle::positional("greet", |_| Value::Null),
        )
        .recurrence(false)
        .output_validator(OutputPattern::new("^Hello ", true).unwrap());
        harness.test_function(&handle, "greet", plan).unwrap();

        let report = harness.finish();
        let tests = group(&report, "Testing function greet");
        assert_eq!(severities(&tests.runs[0]), vec![Correct, Debug, Debug, Correct]);
        assert_eq!(severities(&tests.runs[1]), vec![Correct, Debug, Debug, Incorrect, Info]);
        assert_eq!(tests.runs[1].output[3].content, "Your code did not print the expected message.");
    }

    #[test]
    fn test_custom_output_validator_reason() {
        let module = NativeModule::new("answer.py").function("shout", |_, _, io| {
            io.print("quiet");
            Ok(Value::Null)
        });
        let loud = |output: &str, _: &[Value], _: &[String]| -> Verdict {
            if output.trim().chars().all(|c| !c.is_lowercase()) {
                Ok(())
            } else {
                Err(Mismatch::because("fail_not_loud"))
            }
        };
        let mut harness = Harness::new("shouting");
        let handle = load(&mut harness, module, &LoadOptions::default());
        let plan = TestPlan::new(int_cases(&[json!(1)]), FnOracle::positional("shout", |_| Value::Null))
            .output_validator(loud)
            .messages(overrides(&[
                ("fail_not_loud", "Print in capital letters."),
                ("MessageInfo", "Expected something like HELLO."),
            ]));
        harness.test_function(&handle, "shout", plan).unwrap();
        let report = harness.finish();
        let run = &group(&report, "Testing function shout").runs[0];
        let text = contents(run);
        assert_eq!(&text[3..5], &["Print in capital letters.", "Expected something like HELLO."]);
        assert!(text[5].contains("quiet"));
    }

    #[test]
    fn test_diagnostics_see_arguments_before_the_call() {
        let module = NativeModule::new("answer.py").function("take_last", |_, args, _| {
            let popped = args[0].as_array_mut().and_then(|items| items.pop());
            Ok(json!(popped.and_then(|v| v.as_i64()).unwrap_or(0) + 1))
        });
        let reference = FnOracle::positional("take_last", |args| {
            args[0].as_array().and_then(|items| items.last().cloned()).unwrap_or(Value::Null)
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let check_seen = Arc::clone(&seen);
        let output_seen = Arc::clone(&seen);

        let mut harness = Harness::new("stack");
        let handle = load(&mut harness, module, &LoadOptions::default());
        let plan = TestPlan::new(vec![TestCase::args(vec![json!([1, 2, 3])])], reference)
            .probe(FnProbe::new("fail_never", move |case: &CaseContext<'_>| {
                check_seen.lock().unwrap().push(case.arguments.to_vec());
                Ok(())
            }))
            .output_validator(move |_: &str, args: &[Value], _: &[String]| -> Verdict {
                output_seen.lock().unwrap().push(args.to_vec());
                Ok(())
            });
        let summary = harness.test_function(&handle, "take_last", plan).unwrap();
        assert_eq!(summary.passed, 0);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![vec![json!([1, 2, 3])], vec![json!([1, 2, 3])]]);
    }

    fn make_snippet() -> Arc<NativeModule> {
        Arc::new(NativeModule::new("snippet.py").top_level(|ns, _| {
            ns.set("width", 3);
            ns.set("height", 4);
            ns.set("area", 12);
            ns.set("_tmp", 0);
            Ok(())
        }))
    }

    #[test]
    fn test_snippet_variables() {
        let mut harness = Harness::new("snippet");
        let expected = TableOracle::new("table", vec![json!({"width": 3, "area": 12})]);
        let summary = harness
            .test_snippet(make_snippet(), TestPlan::new(Vec::<TestCase>::new(), expected))
            .unwrap();
        assert_eq!(summary.cases, 1);
        assert_eq!(summary.passed, 1);

        let expected = TableOracle::new("table", vec![json!({"perimeter": 14})]);
        harness
            .test_snippet(make_snippet(), TestPlan::new(Vec::<TestCase>::new(), expected))
            .unwrap();

        let report = harness.finish();
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].title, "Testing code snippet...");
        assert_eq!(severities(&report.groups[0].runs[0]), vec![Correct, Debug]);
        let failed = &report.groups[1].runs[0];
        assert_eq!(failed.output[0].severity, Incorrect);
        assert!(failed.output[0].content.contains("required variables"));
        assert!(failed.output[1].content.contains("area = 12"));
        assert!(!failed.output[1].content.contains("_tmp"));
    }

    #[test]
    fn test_lazy_cases_and_finnish_locale() {
        let mut harness = Harness::new("doubling");
        let options = LoadOptions {
            locale: "fi".to_string(),
            ..LoadOptions::default()
        };
        let handle = load(&mut harness, make_double(0, 2), &options);
        let cases = CaseSource::lazy(|| (1..=2).map(|n| TestCase::args(vec![json!(n)])).collect());
        let plan = TestPlan::new(cases, double_reference()).locale("fi");
        harness.test_function(&handle, "double", plan).unwrap();

        let report = harness.finish();
        assert_eq!(report.groups[0].title, "Ladataan moduulia answer...");
        let tests = &report.groups[1];
        assert_eq!(tests.title, "Testataan funktiota double...");
        assert_eq!(tests.runs[0].output[0].content, "Funktiosi palautti oikean tuloksen.");
    }

    #[test]
    fn test_failing_reference_aborts_before_group_opens() {
        let mut harness = Harness::new("doubling");
        let handle = load(&mut harness, make_double(0, 2), &LoadOptions::default());
        let table = TableOracle::new("table", vec![json!(2)]);
        let err = harness
            .test_function(&handle, "double", TestPlan::new(int_cases(&[json!(1), json!(2)]), table))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Reference { .. }));
        assert_eq!(harness.finish().groups.len(), 1);
    }

    #[test]
    fn test_reports_are_deterministic() {
        let first = serde_json::to_string(&run_doubling(true)).unwrap();
        let second = serde_json::to_string(&run_doubling(true)).unwrap();
        assert_eq!(first, second);
        let value: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["tester"], json!("doubling"));
        assert_eq!(value["tests"][1]["runs"][0]["output"][0]["flag"], json!(1));
    }
}

#[cfg(all(test, unix))]
mod checker_tests {
    use crate::checker::{run_checker, CheckRequest};
    use crate::config::{LanguageConfig, RunnerConfig};
    use senpai_common::checker::CheckerSpec;
    use senpai_common::types::Severity;
    use std::collections::BTreeMap;
    use std::fs;

    const DOUBLING_RUNNER: &str = r#"
if [ "$SENPAI_MODE" != "function" ]; then
    printf '{"status":"ok","variables":{}}' > "$SENPAI_RESULT"
    exit 0
fi
N=$(printf '%s' "$SENPAI_ARGS" | base64 -d | tr -d '[] ')
if [ "$N" = "0" ]; then
    echo 'Traceback (most recent call last):' >&2
    echo "  File \"$SENPAI_SOURCE\", line 2, in double" >&2
    echo '    return 10 // n' >&2
    echo 'ZeroDivisionError: integer division or modulo by zero' >&2
    exit 1
fi
printf '{"status":"ok","value":%s,"arguments":[%s]}' "$((N * 2))" "$N" > "$SENPAI_RESULT"
"#;

    const GUARDED_RUNNER: &str = r#"
case "$SENPAI_MODE" in
module)
    if ! read line; then
        echo 'EOFError: EOF when reading a line' >&2
        exit 1
    fi
    printf '{"status":"ok","variables":{}}' > "$SENPAI_RESULT"
    ;;
import)
    printf '{"status":"ok","variables":{}}' > "$SENPAI_RESULT"
    ;;
function)
    N=$(printf '%s' "$SENPAI_ARGS" | base64 -d | tr -d '[] ')
    printf '{"status":"ok","value":%s,"arguments":[%s]}' "$((N * 2))" "$N" > "$SENPAI_RESULT"
    ;;
esac
"#;

    fn make_language(runner: &std::path::Path) -> LanguageConfig {
        LanguageConfig {
            name: "shell".to_string(),
            file_extension: ".py".to_string(),
            runner: RunnerConfig {
                command: "sh".to_string(),
                args: vec![runner.to_string_lossy().into_owned()],
                env: BTreeMap::new(),
            },
            reserved_names: vec!["math".to_string()],
            highlight: Some("python3".to_string()),
        }
    }

    #[test]
    fn test_checker_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let runner = dir.path().join("runner.sh");
        fs::write(&runner, DOUBLING_RUNNER).unwrap();
        let submission = dir.path().join("answer.py");
        fs::write(&submission, "def double(n):\n    return 10 // n * 0 + n * 2\n").unwrap();

        let checker: CheckerSpec = serde_json::from_value(serde_json::json!({
            "tester": "doubling",
            "tests": [{
                "mode": "function",
                "name": {"en": "double", "fi": "tuplaa"},
                "cases": [
                    {"arguments": [1], "expected": 2},
                    {"arguments": [0], "expected": 0},
                    {"arguments": [4], "expected": 8}
                ]
            }]
        }))
        .unwrap();
        let language = make_language(&runner);
        let request = CheckRequest {
            checker: &checker,
            submission: &submission,
            locale: "en",
            language: &language,
            base_dir: dir.path(),
        };
        let outcome = run_checker(&request).unwrap();

        assert!(outcome.loaded);
        assert_eq!(outcome.groups[0].cases, 3);
        assert_eq!(outcome.groups[0].passed, 2);
        assert_eq!(outcome.groups[0].faulted, 1);
        assert!(!outcome.passed());

        let tests = &outcome.report.groups[1];
        assert_eq!(tests.title, "Testing function double...");
        let faulted = &tests.runs[1].output;
        assert_eq!(faulted[0].severity, Severity::Error);
        assert!(faulted[0].content.contains("ZeroDivisionError"));
        assert_eq!(faulted[1].severity, Severity::Debug);
        assert!(faulted[1].content.contains("return 10 // n"));
        assert!(tests.runs[0].output[1].content.contains("{{{highlight=python3"));
    }

    #[test]
    fn test_function_tests_load_without_running_main_block() {
        let dir = tempfile::tempdir().unwrap();
        let runner = dir.path().join("runner.sh");
        fs::write(&runner, GUARDED_RUNNER).unwrap();
        let submission = dir.path().join("answer.py");
        fs::write(
            &submission,
            "def double(n):\n    return n * 2\n\nif __name__ == \"__main__\":\n    print(double(int(input())))\n",
        )
        .unwrap();
        let checker: CheckerSpec = serde_json::from_value(serde_json::json!({
            "tester": "doubling",
            "tests": [{
                "mode": "function",
                "name": "double",
                "cases": [{"arguments": [1], "expected": 2}, {"arguments": [5], "expected": 10}]
            }]
        }))
        .unwrap();
        let language = make_language(&runner);
        let outcome = run_checker(&CheckRequest {
            checker: &checker,
            submission: &submission,
            locale: "en",
            language: &language,
            base_dir: dir.path(),
        })
        .unwrap();

        assert!(outcome.loaded);
        assert_eq!(outcome.groups[0].passed, 2);
        assert!(outcome.passed());
        assert!(outcome.report.messages().all(|m| m.severity != Severity::Error));
    }

    #[test]
    fn test_checker_rejects_reserved_submission() {
        let dir = tempfile::tempdir().unwrap();
        let runner = dir.path().join("runner.sh");
        fs::write(&runner, DOUBLING_RUNNER).unwrap();
        let submission = dir.path().join("math.py");
        fs::write(&submission, "").unwrap();
        let checker: CheckerSpec = serde_json::from_value(serde_json::json!({
            "tester": "doubling",
            "tests": [{"mode": "function", "name": "double", "cases": [{"arguments": [1], "expected": 2}]}]
        }))
        .unwrap();
        let language = make_language(&runner);
        let outcome = run_checker(&CheckRequest {
            checker: &checker,
            submission: &submission,
            locale: "en",
            language: &language,
            base_dir: dir.path(),
        })
        .unwrap();

        assert!(!outcome.loaded);
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.report.groups.len(), 1);
        assert_eq!(outcome.report.messages().count(), 1);
    }

    #[test]
    fn test_checker_without_expectations_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runner = dir.path().join("runner.sh");
        fs::write(&runner, DOUBLING_RUNNER).unwrap();
        let submission = dir.path().join("answer.py");
        fs::write(&submission, "").unwrap();
        let checker: CheckerSpec = serde_json::from_value(serde_json::json!({
            "tester": "doubling",
            "tests": [{"mode": "function", "name": "double", "cases": [{"arguments": [1]}]}]
        }))
        .unwrap();
        let language = make_language(&runner);
        let err = run_checker(&CheckRequest {
            checker: &checker,
            submission: &submission,
            locale: "en",
            language: &language,
            base_dir: dir.path(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("expected values or a reference"));
    }
}
