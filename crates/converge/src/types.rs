//! Core types for provisioning passes

use serde::{Deserialize, Serialize};

/// Outcome of probing the host for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Detection {
    /// Host already matches what the step wants
    AlreadySatisfied,
    /// The step must run its apply action
    NeedsApply,
}

impl Detection {
    /// Build a detection from a "is it already done?" check
    pub fn from_satisfied(satisfied: bool) -> Self {
        if satisfied {
            Self::AlreadySatisfied
        } else {
            Self::NeedsApply
        }
    }

    /// Check if the step can be skipped
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::AlreadySatisfied)
    }
}

/// Status of a step after the executor has visited it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Already satisfied, apply was not invoked
    Skipped,
    /// Apply ran and changed host state
    Applied,
    /// Apply returned an error
    Failed,
}

impl StepStatus {
    /// Marker used when rendering a status line
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Skipped => "○",
            Self::Applied => "✓",
            Self::Failed => "✗",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Applied => write!(f, "applied"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of running one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    /// Free-text diagnostic (command output, error message)
    pub detail: String,
    pub critical: bool,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Aggregate outcome of one provisioning pass
///
/// Results appear in step order. Once returned by the executor the report is
/// final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Vec<StepResult>,
    /// A critical step failed and halted the run
    pub aborted: bool,
}

impl RunReport {
    fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Number of steps that changed host state
    pub fn applied(&self) -> usize {
        self.count(StepStatus::Applied)
    }

    /// Number of steps that were already satisfied
    pub fn skipped(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    /// Number of steps whose apply failed
    pub fn failed(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    /// Look up the result for a step by name
    pub fn get(&self, name: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Names of the steps in the order they were recorded
    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    /// True when nothing failed at all
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Process exit code for this report: non-critical failures still exit 0
    pub fn exit_code(&self) -> u8 {
        u8::from(self.aborted)
    }
}

/// Options for a provisioning pass
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Detect only; steps that need apply are recorded as skipped
    pub dry_run: bool,
    /// Verbose output inside apply actions
    pub verbose: bool,
}

/// Detect-only view of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyEntry {
    pub name: String,
    pub description: String,
    pub critical: bool,
    /// `Err` holds the probe failure text
    pub detection: Result<Detection, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: StepStatus) -> StepResult {
        StepResult {
            name: name.to_string(),
            status,
            detail: String::new(),
            critical: false,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport {
            results: vec![
                result("a", StepStatus::Skipped),
                result("b", StepStatus::Applied),
                result("c", StepStatus::Failed),
                result("d", StepStatus::Applied),
            ],
            aborted: false,
        };

        assert_eq!(report.applied(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert_eq!(report.names(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_exit_code_ignores_non_critical_failures() {
        let mut report = RunReport {
            results: vec![result("a", StepStatus::Failed)],
            aborted: false,
        };
        assert_eq!(report.exit_code(), 0);

        report.aborted = true;
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_report_serializes_lowercase_status() {
        let report = RunReport {
            results: vec![result("a", StepStatus::Applied)],
            aborted: false,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"applied\""));

        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_detection_from_satisfied() {
        assert_eq!(Detection::from_satisfied(true), Detection::AlreadySatisfied);
        assert_eq!(Detection::from_satisfied(false), Detection::NeedsApply);
        assert!(Detection::AlreadySatisfied.is_satisfied());
    }
}
