//! End-to-end passes of the executor against an in-memory host

use converge::{
    ApplyContext, ApplyError, Detection, DetectionError, ExecuteError, ExecuteOptions, FakeHost,
    Host, KeepAlive, KeepAliveError, NoKeepAlive, NoProgress, ProgressCallback, RunReport, Step,
    StepList, StepResult, StepStatus, execute,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

/// Ensures a marker file exists; state lives on the host
#[derive(Debug)]
struct Marker {
    name: &'static str,
    path: PathBuf,
    critical: bool,
    fail: bool,
}

impl Marker {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            path: PathBuf::from(format!("/var/lib/markers/{name}")),
            critical: false,
            fail: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

impl Step for Marker {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> String {
        format!("Create {}", self.path.display())
    }

    fn kind(&self) -> &'static str {
        "marker"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        Ok(Detection::from_satisfied(host.path_exists(&self.path)?))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        if self.fail {
            return Err(ApplyError::new(format!("cannot create {}", self.path.display())));
        }
        ctx.host.write_file(&self.path, self.name, true)?;
        Ok(format!("created {}", self.path.display()))
    }
}

fn list(steps: Vec<Marker>) -> StepList {
    let mut list = StepList::new();
    for step in steps {
        list.push(Box::new(step)).unwrap();
    }
    list
}

fn run(steps: &StepList, host: &FakeHost) -> Result<RunReport, ExecuteError> {
    execute(
        steps,
        host,
        &mut NoKeepAlive,
        &ExecuteOptions::default(),
        &mut NoProgress,
    )
}

fn statuses(report: &RunReport) -> Vec<(&str, StepStatus)> {
    report
        .results
        .iter()
        .map(|r| (r.name.as_str(), r.status))
        .collect()
}

#[derive(Default)]
struct CountingGrant {
    acquired: usize,
    released: usize,
}

impl KeepAlive for CountingGrant {
    fn acquire(&mut self) -> Result<(), KeepAliveError> {
        self.acquired += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.released += 1;
    }
}

#[derive(Default)]
struct Recorder {
    started: Vec<String>,
    completed: Vec<StepResult>,
    finals: usize,
}

impl ProgressCallback for Recorder {
    fn on_run_start(&mut self, _total: usize) {}

    fn on_step_start(&mut self, _index: usize, _total: usize, name: &str, _description: &str) {
        self.started.push(name.to_string());
    }

    fn on_step_complete(&mut self, result: &StepResult) {
        self.completed.push(result.clone());
    }

    fn on_run_complete(&mut self, _report: &RunReport) {
        self.finals += 1;
    }
}

#[test]
fn satisfied_step_is_skipped_and_pending_step_applied() {
    let host = FakeHost::new().with_file("/var/lib/markers/a", "a");
    let steps = list(vec![Marker::new("a"), Marker::new("b")]);

    let report = run(&steps, &host).unwrap();

    assert_eq!(
        statuses(&report),
        vec![("a", StepStatus::Skipped), ("b", StepStatus::Applied)]
    );
    assert!(!report.aborted);
}

#[test]
fn non_critical_failure_does_not_stop_later_steps() {
    let host = FakeHost::new();
    let steps = list(vec![Marker::new("a").failing(), Marker::new("b")]);

    let report = run(&steps, &host).unwrap();

    assert_eq!(
        statuses(&report),
        vec![("a", StepStatus::Failed), ("b", StepStatus::Applied)]
    );
    assert!(!report.aborted);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn critical_failure_aborts_and_omits_later_steps() {
    let host = FakeHost::new();
    let steps = list(vec![Marker::new("a").failing().critical(), Marker::new("b")]);

    let err = run(&steps, &host).unwrap_err();

    let ExecuteError::Aborted(abort) = err else {
        panic!("expected abort");
    };
    assert_eq!(abort.step, "a");
    assert_eq!(statuses(&abort.report), vec![("a", StepStatus::Failed)]);
    assert!(abort.report.aborted);
    assert_ne!(abort.report.exit_code(), 0);
    assert!(host.file("/var/lib/markers/b").is_none());
}

#[test]
fn second_pass_on_converged_host_only_skips() {
    let host = FakeHost::new().with_file("/var/lib/markers/a", "a");
    let steps = list(vec![Marker::new("a"), Marker::new("b")]);

    let first = run(&steps, &host).unwrap();
    assert_eq!(first.applied(), 1);

    let second = run(&steps, &host).unwrap();
    assert_eq!(
        statuses(&second),
        vec![("a", StepStatus::Skipped), ("b", StepStatus::Skipped)]
    );
    assert_eq!(second.applied(), 0);
}

#[test]
fn results_follow_input_order() {
    let host = FakeHost::new().with_file("/var/lib/markers/m", "m");
    let names = ["z", "m", "a", "q", "b"];
    let steps = list(
        names
            .iter()
            .map(|&n| {
                let step = Marker::new(n);
                if n == "q" { step.failing() } else { step }
            })
            .collect(),
    );

    let mut recorder = Recorder::default();
    let report = execute(
        &steps,
        &host,
        &mut NoKeepAlive,
        &ExecuteOptions::default(),
        &mut recorder,
    )
    .unwrap();

    assert_eq!(report.names(), names.to_vec());
    assert_eq!(recorder.started, names.to_vec());
    assert_eq!(recorder.completed, report.results);
    assert_eq!(recorder.finals, 1);
}

#[test]
fn order_is_preserved_up_to_abort() {
    let host = FakeHost::new();
    let steps = list(vec![
        Marker::new("one"),
        Marker::new("two"),
        Marker::new("three").failing().critical(),
        Marker::new("four"),
    ]);

    let err = run(&steps, &host).unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.names(), vec!["one", "two", "three"]);
}

#[test]
fn keep_alive_released_once_on_completion() {
    let host = FakeHost::new();
    let steps = list(vec![Marker::new("a")]);
    let mut grant = CountingGrant::default();

    execute(
        &steps,
        &host,
        &mut grant,
        &ExecuteOptions::default(),
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(grant.acquired, 1);
    assert_eq!(grant.released, 1);
}

#[test]
fn keep_alive_released_once_on_abort() {
    let host = FakeHost::new();
    let steps = list(vec![Marker::new("a").failing().critical(), Marker::new("b")]);
    let mut grant = CountingGrant::default();

    let result = execute(
        &steps,
        &host,
        &mut grant,
        &ExecuteOptions::default(),
        &mut NoProgress,
    );

    assert!(result.is_err());
    assert_eq!(grant.released, 1);
}

#[test]
fn keep_alive_released_once_when_a_step_panics() {
    #[derive(Debug)]
    struct Panics;

    impl Step for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn description(&self) -> String {
            "Panic during apply".into()
        }
        fn kind(&self) -> &'static str {
            "test"
        }
        fn detect(&self, _host: &dyn Host) -> Result<Detection, DetectionError> {
            Ok(Detection::NeedsApply)
        }
        fn apply(&self, _ctx: &ApplyContext) -> Result<String, ApplyError> {
            panic!("step exploded");
        }
    }

    let host = FakeHost::new();
    let mut steps = StepList::new();
    steps.push(Box::new(Panics)).unwrap();
    let mut grant = CountingGrant::default();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        execute(
            &steps,
            &host,
            &mut grant,
            &ExecuteOptions::default(),
            &mut NoProgress,
        )
    }));

    assert!(outcome.is_err());
    assert_eq!(grant.acquired, 1);
    assert_eq!(grant.released, 1);
}
