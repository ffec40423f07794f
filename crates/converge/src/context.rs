//! Apply context and progress reporting
//!
//! These keep the executor free of any particular UI: the binary renders
//! progress lines, tests record calls, library users can ignore both.

use crate::host::Host;
use crate::types::{RunReport, StepResult};

/// Context passed to step apply actions
pub struct ApplyContext<'a> {
    /// The machine being provisioned
    pub host: &'a dyn Host,
    /// Whether to output verbose information
    pub verbose: bool,
}

impl<'a> ApplyContext<'a> {
    pub fn new(host: &'a dyn Host, verbose: bool) -> Self {
        Self { host, verbose }
    }
}

/// Progress callback for provisioning passes
///
/// Every step outcome is reported as soon as it is known.
pub trait ProgressCallback {
    /// Called once before the first step
    fn on_run_start(&mut self, total: usize);

    /// Called before a step is detected
    fn on_step_start(&mut self, index: usize, total: usize, name: &str, description: &str);

    /// Called when a step's outcome is recorded
    fn on_step_complete(&mut self, result: &StepResult);

    /// Called with the final report (also on abort)
    fn on_run_complete(&mut self, report: &RunReport);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _total: usize) {}
    fn on_step_start(&mut self, _index: usize, _total: usize, _name: &str, _description: &str) {}
    fn on_step_complete(&mut self, _result: &StepResult) {}
    fn on_run_complete(&mut self, _report: &RunReport) {}
}
