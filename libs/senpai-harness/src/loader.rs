/// Candidate Loader
///
/// **Core Responsibility:**
/// Turn a submitted source into a usable handle, or explain in exactly one
/// ERROR event why that is impossible.
///
/// **Critical Properties:**
/// - Name checks run before any candidate code does
/// - Load-time input comes from the options, load-time output is captured
/// - A failed load returns `None` and the caller skips the group's tests

use crate::candidate::CandidateSource;
use crate::capture::{CaptureStream, InputFeed, IoContext};
use crate::catalog::FormatArgs;
use crate::defaults;
use crate::presenter::{DefaultPresenter, Presenter};
use crate::reporter::Reporter;
use senpai_common::checker::MessageOverrides;
use senpai_common::types::Severity;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub locale: String,
    pub inputs: Vec<String>,
    /// Show load-time output as a DEBUG event when false.
    pub hide_output: bool,
    /// Report load-time output as an error when false.
    pub allow_output: bool,
    /// Required extension including the dot; any non-empty one when unset.
    pub extension: Option<String>,
    pub reserved_names: Vec<String>,
    pub messages: MessageOverrides,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            inputs: Vec::new(),
            hide_output: true,
            allow_output: true,
            extension: None,
            reserved_names: Vec::new(),
            messages: MessageOverrides::new(),
        }
    }
}

/// A loaded candidate plus what is needed to load it again.
pub struct CandidateHandle {
    source: Arc<dyn CandidateSource>,
    name: String,
    load_inputs: Vec<String>,
}

impl CandidateHandle {
    /// Module name: the file name without its extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<dyn CandidateSource> {
        &self.source
    }

    pub fn load_inputs(&self) -> &[String] {
        &self.load_inputs
    }
}

fn split_name<'a>(file_name: &'a str, extension: Option<&str>) -> Option<&'a str> {
    match extension {
        Some(ext) => file_name.strip_suffix(ext).filter(|stem| !stem.is_empty()),
        None => file_name
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(stem, _)| stem),
    }
}

fn is_valid_module_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Load `source`, reporting into a new "loading module" group.
pub fn load_module(
    reporter: &mut Reporter,
    source: Arc<dyn CandidateSource>,
    options: &LoadOptions,
) -> Option<CandidateHandle> {
    let file_name = source.file_name().to_string();
    let presenter = DefaultPresenter::default();
    reporter.use_catalog(
        defaults::loading_catalog().with_overrides(&options.messages),
        &options.locale,
    );

    let display_name = split_name(&file_name, options.extension.as_deref()).unwrap_or(&file_name);
    reporter.open_group_from("LoadingModule", &FormatArgs::new().with("name", display_name));
    reporter.open_run();

    let Some(name) = split_name(&file_name, options.extension.as_deref()) else {
        warn!(file = %file_name, "Submission rejected: missing extension");
        let ext = options.extension.clone().unwrap_or_default();
        reporter.append(
            "MissingFileExtension",
            Severity::Error,
            &FormatArgs::new().with("name", file_name.as_str()).with("ext", ext),
        );
        return None;
    };
    let name = name.to_string();
    let name_args = FormatArgs::new().with("name", name.as_str());

    if !is_valid_module_name(&name) {
        warn!(module = %name, "Submission rejected: bad module name");
        reporter.append("BadModuleName", Severity::Error, &name_args);
        return None;
    }
    if options.reserved_names.iter().any(|reserved| reserved == &name) {
        warn!(module = %name, "Submission rejected: reserved module name");
        reporter.append("SystemModuleName", Severity::Error, &name_args);
        return None;
    }

    let mut feed = InputFeed::new(options.inputs.iter().cloned());
    let mut capture = CaptureStream::new();
    let loaded = source.import(&mut IoContext::new(&mut feed, &mut capture));

    match loaded {
        Err(fault) => {
            info!(module = %name, fault = %fault, "Candidate failed to load");
            let args = name_args
                .with("ename", fault.name())
                .with("emsg", fault.message.as_str())
                .with("inputs", presenter.inputs(&options.inputs));
            reporter.append_or(fault.name(), Some("GenericErrorMsg"), Severity::Error, &args);
            if !options.inputs.is_empty() {
                reporter.append("PrintInputVector", Severity::Debug, &args);
            }
            None
        }
        Ok(_) => {
            info!(module = %name, output_bytes = capture.content().len(), "Candidate loaded");
            let args = name_args.with("output", capture.content());
            if !options.allow_output && !capture.is_empty() {
                reporter.append("DisallowedOutput", Severity::Error, &args);
            } else if !options.hide_output {
                reporter.append("PrintStudentOutput", Severity::Debug, &args);
            }
            Some(CandidateHandle {
                source,
                name,
                load_inputs: options.inputs.clone(),
            })
        }
    }
}
