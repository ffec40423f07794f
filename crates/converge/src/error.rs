//! Error taxonomy for provisioning passes
//!
//! Errors are layered by how far they travel:
//! - [`DetectionError`] never leaves the executor (treated as "needs apply")
//! - [`ApplyError`] ends up in the step's result, or becomes an [`AbortError`]
//! - [`AbortError`] is the run-level failure handed back to the caller

use crate::types::RunReport;
use thiserror::Error;

/// The host could not run a command at all (spawn failure, missing sudo, ...)
#[derive(Debug, Clone, Error)]
#[error("failed to run `{command}`: {message}")]
pub struct HostError {
    pub command: String,
    pub message: String,
}

impl HostError {
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// A state probe failed
#[derive(Debug, Clone, Error)]
#[error("detection failed: {0}")]
pub struct DetectionError(pub String);

impl DetectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<HostError> for DetectionError {
    fn from(err: HostError) -> Self {
        Self(err.to_string())
    }
}

/// The apply action itself failed
///
/// The diagnostic is kept verbatim so the operator sees what the command said.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ApplyError(pub String);

impl ApplyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The diagnostic text
    pub fn diagnostic(&self) -> &str {
        &self.0
    }
}

impl From<HostError> for ApplyError {
    fn from(err: HostError) -> Self {
        Self(err.to_string())
    }
}

impl From<DetectionError> for ApplyError {
    fn from(err: DetectionError) -> Self {
        Self(err.0)
    }
}

impl From<std::io::Error> for ApplyError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// A critical step failed and the run was halted
///
/// Holds the report up to and including the failed step.
#[derive(Debug, Error)]
#[error("critical step `{step}` failed: {source}")]
pub struct AbortError {
    pub step: String,
    pub source: ApplyError,
    pub report: Box<RunReport>,
}

/// The keep-alive grant could not be acquired
#[derive(Debug, Clone, Error)]
#[error("could not acquire keep-alive grant: {0}")]
pub struct KeepAliveError(pub String);

/// A step name was registered twice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate step name: {0}")]
pub struct DuplicateStep(pub String);

/// Run-level failures returned by [`crate::execute`]
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Aborted(#[from] AbortError),

    #[error(transparent)]
    KeepAlive(#[from] KeepAliveError),
}

impl ExecuteError {
    /// The partial report, if any step ran
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Aborted(abort) => Some(&abort.report),
            Self::KeepAlive(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_converts_to_apply_error() {
        let err: ApplyError = HostError::new("apt-get install -y zsh", "No such file").into();
        assert_eq!(
            err.diagnostic(),
            "failed to run `apt-get install -y zsh`: No such file"
        );
    }

    #[test]
    fn test_abort_error_message_names_step() {
        let err = AbortError {
            step: "base-packages".into(),
            source: ApplyError::new("E: Unable to locate package nope"),
            report: Box::default(),
        };
        assert_eq!(
            err.to_string(),
            "critical step `base-packages` failed: E: Unable to locate package nope"
        );
    }

    #[test]
    fn test_execute_error_report() {
        let err = ExecuteError::from(KeepAliveError("sudo: a password is required".into()));
        assert!(err.report().is_none());
    }
}
