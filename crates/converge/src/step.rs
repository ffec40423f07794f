//! Step trait and the ordered step list
//!
//! A Step is one unit of provisioning work: something that can tell whether
//! the host already has it, and can make it so when it does not.

use crate::context::ApplyContext;
use crate::error::{ApplyError, DetectionError, DuplicateStep};
use crate::host::Host;
use crate::types::Detection;
use std::collections::HashSet;
use std::fmt;

/// Core trait for provisioning steps
///
/// Steps are static configuration: built once, never mutated while running,
/// which is why every method takes `&self`.
///
/// # Contract
///
/// - [`Step::detect`] must not change the host
/// - [`Step::apply`] may assume nothing about earlier non-critical steps, and
///   should re-check naturally idempotent effects (appending a line, adding a
///   key) since the host can change between detect and apply
pub trait Step: Send + Sync + fmt::Debug {
    /// Unique identifier (e.g., "install-docker")
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> String;

    /// Step type category (e.g., "apt_packages", "line_in_file")
    fn kind(&self) -> &'static str;

    /// Whether a failure of this step halts the run
    fn critical(&self) -> bool {
        false
    }

    /// Probe current host state
    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError>;

    /// Converge the host; returns a short diagnostic on success
    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError>;
}

/// A boxed step for type-erased storage
pub type BoxedStep = Box<dyn Step>;

/// Ordered, name-unique list of steps
///
/// Insertion order is execution order.
#[derive(Debug, Default)]
pub struct StepList {
    steps: Vec<BoxedStep>,
    names: HashSet<String>,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, rejecting duplicate names
    pub fn push(&mut self, step: BoxedStep) -> Result<(), DuplicateStep> {
        let name = step.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(DuplicateStep(name));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Step> {
        self.steps.iter().map(|s| &**s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Step names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Keep only the steps matching `keep`, preserving order
    pub fn retain(&mut self, mut keep: impl FnMut(&dyn Step) -> bool) {
        self.steps.retain(|s| keep(&**s));
        self.names = self.steps.iter().map(|s| s.name().to_string()).collect();
    }
}
