/// Process Backend
///
/// **Core Responsibility:**
/// Run submitted and reference code in an external runner process and
/// translate what comes back into values and faults.
///
/// **Critical Properties:**
/// - One process per invocation; nothing survives between invocations
/// - Invocations block until the runner exits
/// - stdout is captured even when the program faults
/// - Infrastructure failures (spawn errors, protocol violations) surface as
///   a `HarnessError` fault so the case still reports something
///
/// **Runner protocol:**
/// Parameters travel in `SENPAI_*` environment variables, input lines on
/// stdin, and the runner writes a JSON verdict to `SENPAI_RESULT`. When no
/// verdict appears the stderr traceback is classified instead.

use crate::candidate::{Candidate, CandidateSource};
use crate::capture::{CaptureStream, InputFeed, IoContext};
use crate::config::LanguageConfig;
use crate::error::{HarnessError, Result};
use crate::fault::{Fault, FaultKind};
use crate::oracle::Oracle;
use crate::parser::OutputParser;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tempfile::TempDir;
use tracing::{debug, error, instrument};

/// What the runner should do with the source file.
#[derive(Debug, Clone, Copy)]
pub enum Call<'a> {
    /// Execute the file top to bottom as the main program.
    Module,
    /// Execute the file as an imported module; main-guarded code is skipped.
    Import,
    /// Execute the file with `load_inputs` and discarded output, then call
    /// `name` with `args`.
    Function {
        name: &'a str,
        args: &'a [Value],
        load_inputs: &'a [String],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub source: &'a Path,
    /// Name used to find the candidate's frames in a traceback.
    pub file_name: &'a str,
    pub call: Call<'a>,
    pub repeat: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResponse {
    pub value: Value,
    /// Arguments after the call.
    pub arguments: Vec<Value>,
    pub variables: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum RunnerVerdict {
    Ok {
        #[serde(default)]
        value: Value,
        #[serde(default)]
        arguments: Vec<Value>,
        #[serde(default)]
        variables: BTreeMap<String, Value>,
        #[serde(default)]
        consumed: Option<usize>,
    },
    Fault {
        kind: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        line: Option<u32>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        consumed: Option<usize>,
    },
}

/// Spawns runner processes for one configured language.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    language: LanguageConfig,
}

impl ProcessEngine {
    pub fn new(language: LanguageConfig) -> Self {
        Self { language }
    }

    pub fn language(&self) -> &LanguageConfig {
        &self.language
    }

    /// Run one invocation, reading input from and writing output to `io`.
    ///
    /// The input feed advances by the number of lines the program read.
    #[instrument(skip(self, request, io), fields(language = %self.language.name, file = request.file_name))]
    pub fn execute(&self, request: &RunRequest<'_>, io: &mut IoContext<'_>) -> std::result::Result<RunResponse, Fault> {
        match self.spawn_and_wait(request, io) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Runner invocation failed");
                Err(Fault::new(FaultKind::Other("HarnessError".to_string()), e.to_string()))
            }
        }
    }

    fn spawn_and_wait(
        &self,
        request: &RunRequest<'_>,
        io: &mut IoContext<'_>,
    ) -> Result<std::result::Result<RunResponse, Fault>> {
        let runner = &self.language.runner;
        let workdir = tempfile::tempdir()?;
        let result_path = workdir.path().join("verdict.json");

        let mut command = Command::new(&runner.command);
        command
            .args(&runner.args)
            .envs(&runner.env)
            .env("SENPAI_SOURCE", request.source)
            .env("SENPAI_RESULT", &result_path)
            .env("SENPAI_REPEAT", request.repeat.max(1).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match request.call {
            Call::Module => {
                command.env("SENPAI_MODE", "module");
            }
            Call::Import => {
                command.env("SENPAI_MODE", "import");
            }
            Call::Function { name, args, load_inputs } => {
                command
                    .env("SENPAI_MODE", "function")
                    .env("SENPAI_FUNCTION", name)
                    .env("SENPAI_ARGS", STANDARD.encode(serde_json::to_vec(args)?))
                    .env("SENPAI_LOAD_INPUTS", STANDARD.encode(serde_json::to_vec(load_inputs)?));
            }
        }

        let mut child = command.spawn().map_err(|source| HarnessError::Spawn {
            command: runner.command.clone(),
            source,
        })?;

        let input = io.input.peek_joined();
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                // The program may exit without reading everything.
                let _ = stdin.write_all(input.as_bytes());
            })
        });
        let stdout = drain_pipe(child.stdout.take());
        let stderr = drain_pipe(child.stderr.take());

        let status = child.wait()?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        io.output.write_str(&stdout);

        let verdict = match fs::read_to_string(&result_path) {
            Ok(text) => Some(
                serde_json::from_str::<RunnerVerdict>(&text)
                    .map_err(|e| HarnessError::Protocol(format!("unreadable verdict: {}", e)))?,
            ),
            Err(_) => None,
        };
        debug!(status = %status, has_verdict = verdict.is_some(), stdout_bytes = stdout.len(), "Runner finished");

        Ok(match verdict {
            Some(RunnerVerdict::Ok {
                value,
                arguments,
                variables,
                consumed,
            }) => {
                advance(io.input, consumed);
                Ok(RunResponse {
                    value,
                    arguments,
                    variables,
                })
            }
            Some(RunnerVerdict::Fault {
                kind,
                message,
                line,
                text,
                consumed,
            }) => {
                advance(io.input, consumed);
                let fault = Fault::new(FaultKind::from_name(&kind), message);
                Err(match line {
                    Some(line) => fault.at(line, text.unwrap_or_default()),
                    None => fault,
                })
            }
            None => {
                io.input.drain_joined();
                classify_exit(status, &stderr, request.file_name)?
            }
        })
    }
}

fn classify_exit(status: ExitStatus, stderr: &str, file_name: &str) -> Result<std::result::Result<RunResponse, Fault>> {
    if status.success() {
        return Err(HarnessError::Protocol("runner exited without writing a verdict".to_string()));
    }
    Ok(Err(Fault::from_traceback(stderr, file_name).unwrap_or_else(|| {
        Fault::new(
            FaultKind::Other("RuntimeError".to_string()),
            format!("program exited with {}", status),
        )
    })))
}

fn advance(feed: &mut InputFeed, consumed: Option<usize>) {
    match consumed {
        Some(count) => feed.advance(count),
        None => {
            feed.drain_joined();
        }
    }
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

/// A submission file run through the language runner.
#[derive(Debug, Clone)]
pub struct ProcessSource {
    path: PathBuf,
    file_name: String,
    engine: Arc<ProcessEngine>,
}

impl ProcessSource {
    pub fn new(path: impl Into<PathBuf>, engine: Arc<ProcessEngine>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, file_name, engine }
    }

    fn load(&self, call: Call<'_>, io: &mut IoContext<'_>) -> std::result::Result<Box<dyn Candidate>, Fault> {
        let before = io.input.pending();
        let request = RunRequest {
            source: &self.path,
            file_name: &self.file_name,
            call,
            repeat: 1,
        };
        let response = self.engine.execute(&request, io)?;
        let consumed = before.len() - io.input.remaining();
        Ok(Box::new(ProcessCandidate {
            source: self.clone(),
            load_inputs: before[..consumed].to_vec(),
            variables: response.variables,
        }))
    }
}

impl CandidateSource for ProcessSource {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn instantiate(&self, io: &mut IoContext<'_>) -> std::result::Result<Box<dyn Candidate>, Fault> {
        self.load(Call::Module, io)
    }

    fn import(&self, io: &mut IoContext<'_>) -> std::result::Result<Box<dyn Candidate>, Fault> {
        self.load(Call::Import, io)
    }
}

/// A loaded process module. Each call runs in a new process that first
/// replays the top level with the lines it originally read.
struct ProcessCandidate {
    source: ProcessSource,
    load_inputs: Vec<String>,
    variables: BTreeMap<String, Value>,
}

impl Candidate for ProcessCandidate {
    fn call(&mut self, function: &str, args: &mut [Value], io: &mut IoContext<'_>) -> std::result::Result<Value, Fault> {
        self.call_repeated(function, args, 1, io)
    }

    fn call_repeated(
        &mut self,
        function: &str,
        args: &mut [Value],
        repeat: usize,
        io: &mut IoContext<'_>,
    ) -> std::result::Result<Value, Fault> {
        let snapshot = args.to_vec();
        let request = RunRequest {
            source: &self.source.path,
            file_name: &self.source.file_name,
            call: Call::Function {
                name: function,
                args: &snapshot,
                load_inputs: &self.load_inputs,
            },
            repeat,
        };
        let response = self.source.engine.execute(&request, io)?;
        if response.arguments.len() == args.len() {
            args.clone_from_slice(&response.arguments);
        }
        Ok(response.value)
    }

    fn variables(&self) -> BTreeMap<String, Value> {
        self.variables.clone()
    }
}

/// A code fragment wrapped between a prelude and a postlude.
///
/// Fault line numbers are reported relative to the fragment.
pub struct SnippetSource {
    inner: ProcessSource,
    prelude_lines: u32,
    _workdir: TempDir,
}

impl SnippetSource {
    pub fn new(
        file_name: &str,
        prelude: &str,
        body: &str,
        postlude: &str,
        engine: Arc<ProcessEngine>,
    ) -> Result<Self> {
        let workdir = tempfile::tempdir()?;
        let path = workdir.path().join(file_name);
        let mut code = String::new();
        for part in [prelude, body, postlude] {
            if part.is_empty() {
                continue;
            }
            code.push_str(part);
            if !part.ends_with('\n') {
                code.push('\n');
            }
        }
        fs::write(&path, code)?;
        let prelude_lines = prelude.lines().count() as u32;
        Ok(Self {
            inner: ProcessSource::new(path, engine),
            prelude_lines,
            _workdir: workdir,
        })
    }
}

impl CandidateSource for SnippetSource {
    fn file_name(&self) -> &str {
        self.inner.file_name()
    }

    fn instantiate(&self, io: &mut IoContext<'_>) -> std::result::Result<Box<dyn Candidate>, Fault> {
        self.inner.instantiate(io).map_err(|mut fault| {
            if let Some(location) = fault.location.as_mut() {
                location.line = location.line.saturating_sub(self.prelude_lines);
            }
            fault
        })
    }
}

/// What a reference program's expected value is taken from.
#[derive(Clone)]
enum Expectation {
    Return(String),
    Output(Option<Arc<dyn OutputParser>>),
    Variables,
}

/// Reference implementation run through the language runner.
#[derive(Clone)]
pub struct ProcessOracle {
    name: String,
    source: ProcessSource,
    expectation: Expectation,
}

impl ProcessOracle {
    /// Expected value is what `function` returns.
    pub fn function(name: &str, path: impl Into<PathBuf>, function: &str, engine: Arc<ProcessEngine>) -> Self {
        Self {
            name: name.to_string(),
            source: ProcessSource::new(path, engine),
            expectation: Expectation::Return(function.to_string()),
        }
    }

    /// Expected value is the program's output, parsed when a parser is set.
    pub fn program(
        name: &str,
        path: impl Into<PathBuf>,
        parser: Option<Arc<dyn OutputParser>>,
        engine: Arc<ProcessEngine>,
    ) -> Self {
        Self {
            name: name.to_string(),
            source: ProcessSource::new(path, engine),
            expectation: Expectation::Output(parser),
        }
    }

    /// Expected value is the object of variables the program defines.
    pub fn snippet(name: &str, path: impl Into<PathBuf>, engine: Arc<ProcessEngine>) -> Self {
        Self {
            name: name.to_string(),
            source: ProcessSource::new(path, engine),
            expectation: Expectation::Variables,
        }
    }

    fn failure(&self, reason: impl ToString) -> HarnessError {
        HarnessError::Reference {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Oracle for ProcessOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, _index: usize, arguments: Vec<Value>, inputs: &[String]) -> Result<Value> {
        let mut feed = InputFeed::new(inputs.iter().cloned());
        let mut capture = CaptureStream::new();
        let mut io = IoContext::new(&mut feed, &mut capture);
        let call = match &self.expectation {
            Expectation::Return(function) => Call::Function {
                name: function,
                args: &arguments,
                load_inputs: &[],
            },
            Expectation::Output(_) | Expectation::Variables => Call::Module,
        };
        let request = RunRequest {
            source: &self.source.path,
            file_name: &self.source.file_name,
            call,
            repeat: 1,
        };
        let response = self.source.engine.execute(&request, &mut io).map_err(|fault| self.failure(fault))?;

        match &self.expectation {
            Expectation::Return(_) => Ok(response.value),
            Expectation::Output(Some(parser)) => parser.parse(capture.content()).map_err(|e| self.failure(e)),
            Expectation::Output(None) => Ok(Value::String(capture.content().to_string())),
            Expectation::Variables => Ok(Value::Object(response.variables.into_iter().collect())),
        }
    }
}
