/// Execution Driver
///
/// **Core Responsibility:**
/// Run one test case against a freshly instantiated candidate and hand back
/// what happened, without judging it.
///
/// **Critical Properties:**
/// - Capture is cleared and input rebound before every case
/// - Arguments are cloned for display before the candidate can touch them
/// - The candidate runs exactly `repeat` times; only the last value counts
/// - A fault ends the case; there are no retries

use crate::candidate::CandidateSource;
use crate::capture::{CaptureStream, InputFeed, IoContext};
use crate::fault::Fault;
use crate::oracle::TestCase;
use serde_json::{Map, Value};
use tracing::debug;

/// What the case invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Call a function on an instance built from the load inputs.
    Function(&'a str),
    /// Run the whole program; nothing is returned.
    Program,
    /// Run the code and return its public variables as an object.
    Snippet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success { value: Value, output: String },
    Fault { fault: Fault, output: String },
}

impl ExecutionOutcome {
    pub fn output(&self) -> &str {
        match self {
            ExecutionOutcome::Success { output, .. } | ExecutionOutcome::Fault { output, .. } => output,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExecution {
    /// Arguments as they were before the call.
    pub stored_args: Vec<Value>,
    /// Arguments after the call, possibly mutated by the candidate.
    pub arguments: Vec<Value>,
    pub outcome: ExecutionOutcome,
}

pub fn run_case<C>(
    source: &dyn CandidateSource,
    load_inputs: &[String],
    target: Target<'_>,
    case: &TestCase,
    repeat: usize,
    capture: &mut CaptureStream,
    cloner: C,
) -> CaseExecution
where
    C: Fn(&[Value]) -> Vec<Value>,
{
    let repeat = repeat.max(1);
    let stored_args = cloner(&case.arguments);
    let mut arguments = case.arguments.clone();
    capture.clear();
    let mut feed = InputFeed::repeated(&case.inputs, repeat);

    let result = match target {
        Target::Function(name) => {
            let mut load_feed = InputFeed::new(load_inputs.iter().cloned());
            let mut scratch = CaptureStream::new();
            match source.import(&mut IoContext::new(&mut load_feed, &mut scratch)) {
                Ok(mut instance) => {
                    let mut io = IoContext::new(&mut feed, &mut *capture);
                    instance.call_repeated(name, &mut arguments, repeat, &mut io)
                }
                Err(fault) => Err(fault),
            }
        }
        Target::Program | Target::Snippet => {
            let mut last = Ok(Value::Null);
            for _ in 0..repeat {
                let mut io = IoContext::new(&mut feed, &mut *capture);
                match source.instantiate(&mut io) {
                    Ok(instance) if target == Target::Snippet => {
                        let vars: Map<String, Value> = instance.variables().into_iter().collect();
                        last = Ok(Value::Object(vars));
                    }
                    Ok(_) => {}
                    Err(fault) => {
                        last = Err(fault);
                        break;
                    }
                }
            }
            last
        }
    };

    let output = capture.content().to_string();
    let outcome = match result {
        Ok(value) => ExecutionOutcome::Success { value, output },
        Err(fault) => {
            debug!(fault = %fault, "Case raised a fault");
            ExecutionOutcome::Fault { fault, output }
        }
    };

    CaseExecution {
        stored_args,
        arguments,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::NativeModule;
    use crate::fault::FaultKind;
    use serde_json::json;

    fn clone_args(args: &[Value]) -> Vec<Value> {
        args.to_vec()
    }

    fn make_module() -> NativeModule {
        NativeModule::new("m.py")
            .top_level(|ns, _| {
                ns.set("calls", 0);
                Ok(())
            })
            .function("append_and_count", |ns, args, io| {
                let calls = ns.get("calls").and_then(Value::as_i64).unwrap_or(0) + 1;
                ns.set("calls", calls);
                if let Some(list) = args[0].as_array_mut() {
                    list.push(json!(calls));
                }
                let line = io.read_line()?;
                io.print(&line);
                Ok(json!(calls))
            })
    }

    #[test]
    fn test_function_case_repeats_and_keeps_last_value() {
        let module = make_module();
        let mut capture = CaptureStream::new();
        capture.write_str("stale");
        let case = TestCase::new(vec![json!([])], vec!["a".to_string()]);
        let run = run_case(&module, &[], Target::Function("append_and_count"), &case, 2, &mut capture, clone_args);

        assert_eq!(run.stored_args, vec![json!([])]);
        assert_eq!(run.arguments, vec![json!([1, 2])]);
        assert_eq!(
            run.outcome,
            ExecutionOutcome::Success {
                value: json!(2),
                output: "a\na\n".to_string()
            }
        );
    }

    #[test]
    fn test_state_does_not_leak_between_cases() {
        let module = make_module();
        let mut capture = CaptureStream::new();
        let case = TestCase::new(vec![json!([])], vec!["a".to_string()]);
        for _ in 0..2 {
            let run = run_case(&module, &[], Target::Function("append_and_count"), &case, 1, &mut capture, clone_args);
            assert!(matches!(run.outcome, ExecutionOutcome::Success { ref value, .. } if *value == json!(1)));
        }
    }

    #[test]
    fn test_fault_ends_case_with_mutations_visible() {
        let module = make_module();
        let mut capture = CaptureStream::new();
        let case = TestCase::args(vec![json!([])]);
        let run = run_case(&module, &[], Target::Function("append_and_count"), &case, 3, &mut capture, clone_args);
        assert_eq!(run.arguments, vec![json!([1])]);
        match run.outcome {
            ExecutionOutcome::Fault { fault, output } => {
                assert_eq!(fault.kind, FaultKind::EndOfInput);
                assert_eq!(output, "");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_program_and_snippet_targets() {
        let program = NativeModule::new("p.py").top_level(|ns, io| {
            let n: i64 = io.read_line()?.parse().unwrap_or(0);
            ns.set("doubled", n * 2);
            io.print(n * 2);
            Ok(())
        });
        let mut capture = CaptureStream::new();
        let case = TestCase::inputs(["21"]);

        let run = run_case(&program, &[], Target::Program, &case, 1, &mut capture, clone_args);
        assert_eq!(
            run.outcome,
            ExecutionOutcome::Success {
                value: Value::Null,
                output: "42\n".to_string()
            }
        );

        let run = run_case(&program, &[], Target::Snippet, &case, 1, &mut capture, clone_args);
        assert!(matches!(run.outcome, ExecutionOutcome::Success { ref value, .. } if *value == json!({"doubled": 42})));
    }
}
