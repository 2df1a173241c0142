/// Job Executor - Grading Orchestration
///
/// **Responsibility:**
/// Turn one queued `GradingJob` into a `GradingResult`: materialize the
/// submission on disk, run the checker through the harness and fold the
/// outcome into the exercise state.
///
/// This module is the glue layer - it knows nothing about:
/// - How submissions execute (process backend's job)
/// - How cases are judged (harness's job)
///
/// Runs synchronously; the worker calls it from a blocking thread.

use anyhow::{bail, Context, Result};
use senpai_common::types::{GradingJob, GradingResult, GradingStatus, Report};
use senpai_harness::{run_checker, CheckOutcome, CheckRequest, LanguageConfigManager};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Grade a job. Harness failures become an `Aborted` result, never an error.
pub fn grade(job: &GradingJob, languages: &LanguageConfigManager, checker_root: &Path) -> GradingResult {
    println!("→ Grading job: {}", job.id);

    let outcome = run_job(job, languages, checker_root);
    if let Err(e) = &outcome {
        warn!(job_id = %job.id, error = %e, "Grading aborted");
    }
    finish(job, outcome)
}

fn run_job(job: &GradingJob, languages: &LanguageConfigManager, checker_root: &Path) -> Result<CheckOutcome> {
    let language = languages.get_config(&job.language)?;

    let workdir = tempfile::tempdir().context("Failed to create submission directory")?;
    let file_name = submission_file_name(&job.submission.file_name)?;
    let submission = workdir.path().join(file_name);
    fs::write(&submission, &job.submission.source_code)
        .with_context(|| format!("Failed to write {}", submission.display()))?;

    let outcome = run_checker(&CheckRequest {
        checker: &job.checker,
        submission: &submission,
        locale: &job.locale,
        language,
        base_dir: checker_root,
    })?;

    info!(
        job_id = %job.id,
        loaded = outcome.loaded,
        groups = outcome.groups.len(),
        passed = outcome.passed(),
        "Checker finished"
    );
    Ok(outcome)
}

/// The platform sends a bare file name; anything path-like is cut down to
/// its last component.
fn submission_file_name(raw: &str) -> Result<&str> {
    match Path::new(raw).file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => bail!("Invalid submission file name '{}'", raw),
    }
}

fn finish(job: &GradingJob, outcome: Result<CheckOutcome>) -> GradingResult {
    let mut state = job.state.clone();

    let (status, report, error) = match outcome {
        Ok(outcome) => {
            let passed = outcome.passed();
            if let (Some(state), Some(kind)) = (state.as_mut(), job.question_class) {
                state.record(kind, passed);
            }
            let status = if passed {
                GradingStatus::Passed
            } else {
                GradingStatus::Failed
            };
            (status, outcome.report, None)
        }
        Err(e) => (
            GradingStatus::Aborted,
            Report::new(job.checker.tester.clone()),
            Some(format!("{:#}", e)),
        ),
    };

    GradingResult {
        job_id: job.id,
        status,
        report,
        state,
        error,
        completed_at: chrono::Utc::now(),
    }
}
