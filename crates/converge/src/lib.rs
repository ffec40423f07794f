//! # Converge
//!
//! Sequential, idempotent provisioning of a single host.
//!
//! A provisioning pass is an ordered list of [`Step`]s. Each step knows how to
//! detect whether the host already matches what it wants, and how to apply the
//! change when it does not. The executor walks the list exactly once, in order:
//!
//! - **Detect**: `AlreadySatisfied` records `Skipped` and never calls `apply`
//! - **Apply**: success records `Applied`, an error records `Failed`
//! - **Abort**: a failed *critical* step stops the run
//!
//! ## Example
//!
//! ```
//! use converge::{
//!     ApplyContext, ApplyError, Detection, DetectionError, ExecuteOptions, FakeHost, Host,
//!     HostCommand, NoKeepAlive, NoProgress, Step, StepList, StepStatus, execute,
//! };
//!
//! #[derive(Debug)]
//! struct Touch(&'static str);
//!
//! impl Step for Touch {
//!     fn name(&self) -> &str { "touch-marker" }
//!     fn description(&self) -> String { format!("Create {}", self.0) }
//!     fn kind(&self) -> &'static str { "file" }
//!
//!     fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
//!         Ok(Detection::from_satisfied(host.path_exists(std::path::Path::new(self.0))?))
//!     }
//!
//!     fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
//!         ctx.host.run_checked(&HostCommand::new("touch").arg(self.0))?;
//!         Ok(format!("created {}", self.0))
//!     }
//! }
//!
//! let mut steps = StepList::new();
//! steps.push(Box::new(Touch("/tmp/marker"))).unwrap();
//!
//! let host = FakeHost::new();
//! let report = execute(
//!     &steps,
//!     &host,
//!     &mut NoKeepAlive,
//!     &ExecuteOptions::default(),
//!     &mut NoProgress,
//! )
//! .unwrap();
//!
//! assert_eq!(report.results[0].status, StepStatus::Applied);
//! ```
//!
//! ## Seams
//!
//! - [`Host`]: the only way steps touch the machine ([`FakeHost`] for tests)
//! - [`KeepAlive`]: a time-boxed grant held for the whole run
//! - [`ProgressCallback`]: receives each outcome as it happens

pub mod context;
pub mod error;
pub mod executor;
pub mod host;
pub mod keepalive;
pub mod step;
pub mod testing;
pub mod types;

pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use error::{
    AbortError, ApplyError, DetectionError, DuplicateStep, ExecuteError, HostError,
    KeepAliveError,
};
pub use executor::{execute, survey};
pub use host::{CommandOutput, Host, HostCommand};
pub use keepalive::{KeepAlive, KeepAliveScope, NoKeepAlive};
pub use step::{BoxedStep, Step, StepList};
pub use testing::FakeHost;
pub use types::{Detection, ExecuteOptions, RunReport, StepResult, StepStatus, SurveyEntry};
