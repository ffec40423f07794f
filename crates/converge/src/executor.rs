//! Execution engine - runs steps strictly in order against one host

use crate::context::{ApplyContext, ProgressCallback};
use crate::error::{AbortError, ApplyError, ExecuteError};
use crate::host::Host;
use crate::keepalive::{KeepAlive, KeepAliveScope};
use crate::step::{Step, StepList};
use crate::types::{
    Detection, ExecuteOptions, RunReport, StepResult, StepStatus, SurveyEntry,
};
use std::time::Instant;

/// Execute a provisioning pass
///
/// The keep-alive grant is acquired before the first step and released on
/// every exit path (completion, abort, panic unwinding through this frame).
///
/// # Returns
/// The finalized report, or [`ExecuteError::Aborted`] carrying the report up
/// to the failed critical step.
pub fn execute<P>(
    steps: &StepList,
    host: &dyn Host,
    keep_alive: &mut dyn KeepAlive,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<RunReport, ExecuteError>
where
    P: ProgressCallback + ?Sized,
{
    let _grant = KeepAliveScope::acquire(keep_alive)?;

    let total = steps.len();
    let mut report = RunReport::default();
    progress.on_run_start(total);

    for (index, step) in steps.iter().enumerate() {
        progress.on_step_start(index + 1, total, step.name(), &step.description());

        let started = Instant::now();
        let outcome = run_step(step, host, opts);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, detail, failure) = match outcome {
            Outcome::Skipped(detail) => (StepStatus::Skipped, detail, None),
            Outcome::Applied(detail) => (StepStatus::Applied, detail, None),
            Outcome::Failed(err) => (StepStatus::Failed, err.to_string(), Some(err)),
        };

        let result = StepResult {
            name: step.name().to_string(),
            status,
            detail,
            critical: step.critical(),
            duration_ms,
        };
        progress.on_step_complete(&result);
        report.results.push(result);

        if let Some(err) = failure {
            if step.critical() {
                log::error!("critical step {} failed, aborting run", step.name());
                report.aborted = true;
                progress.on_run_complete(&report);
                return Err(AbortError {
                    step: step.name().to_string(),
                    source: err,
                    report: Box::new(report),
                }
                .into());
            }
            log::warn!("step {} failed, continuing", step.name());
        }
    }

    progress.on_run_complete(&report);
    Ok(report)
}

enum Outcome {
    Skipped(String),
    Applied(String),
    Failed(ApplyError),
}

/// Detect, then apply when needed
fn run_step(step: &dyn Step, host: &dyn Host, opts: &ExecuteOptions) -> Outcome {
    match step.detect(host) {
        Ok(Detection::AlreadySatisfied) => {
            log::debug!("{}: already satisfied", step.name());
            return Outcome::Skipped("already satisfied".to_string());
        }
        Ok(Detection::NeedsApply) => log::debug!("{}: needs apply", step.name()),
        // Optimistic fallback: try the action rather than block the run
        Err(e) => log::warn!("{}: {e}; attempting apply", step.name()),
    }

    if opts.dry_run {
        return Outcome::Skipped("would apply".to_string());
    }

    let ctx = ApplyContext::new(host, opts.verbose);
    match step.apply(&ctx) {
        Ok(detail) => Outcome::Applied(detail),
        Err(e) => Outcome::Failed(e),
    }
}

/// Detect-only pass over every step, no side effects
pub fn survey(steps: &StepList, host: &dyn Host) -> Vec<SurveyEntry> {
    steps
        .iter()
        .map(|step| SurveyEntry {
            name: step.name().to_string(),
            description: step.description(),
            critical: step.critical(),
            detection: step.detect(host).map_err(|e| e.to_string()),
        })
        .collect()
}
