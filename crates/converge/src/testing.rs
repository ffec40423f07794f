//! In-memory host for tests
//!
//! [`FakeHost`] stands in for a real machine so detection and apply logic can
//! be exercised without side effects:
//!
//! ```
//! use converge::{CommandOutput, FakeHost, Host, HostCommand};
//! use std::path::Path;
//!
//! let host = FakeHost::new().with_file("/etc/shells", "/bin/bash\n/usr/bin/zsh\n");
//! host.respond("getent passwd", CommandOutput::ok("dev:x:1000:1000::/home/dev:/bin/bash\n"));
//!
//! assert!(host.path_exists(Path::new("/etc/shells")).unwrap());
//! let out = host.run(&HostCommand::new("getent").args(["passwd", "dev"])).unwrap();
//! assert!(out.stdout_str().ends_with("/bin/bash\n"));
//! assert!(host.ran("getent passwd dev"));
//! ```

use crate::error::{ApplyError, HostError};
use crate::host::{CommandOutput, Host, HostCommand};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Host whose state lives in memory
///
/// Commands are matched against scripted responses by prefix of their
/// displayed command line; the most recently registered match wins, and
/// unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct FakeHost {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    commands: Mutex<BTreeSet<String>>,
    responses: Mutex<Vec<(String, CommandOutput)>>,
    log: Mutex<Vec<HostCommand>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.set_file(path, contents);
        self
    }

    /// Seed a directory
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        lock(&self.dirs).insert(path.into());
        self
    }

    /// Seed an executable on `$PATH`
    pub fn with_command(self, name: impl Into<String>) -> Self {
        lock(&self.commands).insert(name.into());
        self
    }

    /// Script the output of every command whose line starts with `prefix`
    pub fn respond(&self, prefix: impl Into<String>, output: CommandOutput) {
        lock(&self.responses).push((prefix.into(), output));
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        lock(&self.dirs).insert(path.into());
    }

    /// Current contents of a file
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    /// Command lines run so far, in order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.log).iter().map(HostCommand::display).collect()
    }

    /// Commands run so far, with their flags and stdin
    pub fn command_log(&self) -> Vec<HostCommand> {
        lock(&self.log).clone()
    }

    /// Whether any command line started with `prefix`
    pub fn ran(&self, prefix: &str) -> bool {
        lock(&self.log)
            .iter()
            .any(|c| c.display().starts_with(prefix))
    }
}

impl Host for FakeHost {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput, HostError> {
        lock(&self.log).push(command.clone());

        let line = command.display();
        let output = lock(&self.responses)
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(Vec::new()));
        Ok(output)
    }

    fn path_exists(&self, path: &Path) -> Result<bool, HostError> {
        if lock(&self.dirs).iter().any(|d| d.starts_with(path)) {
            return Ok(true);
        }
        Ok(lock(&self.files).keys().any(|f| f.starts_with(path)))
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        Ok(self.file(path))
    }

    fn write_file(&self, path: &Path, contents: &str, privileged: bool) -> Result<(), ApplyError> {
        lock(&self.log).push(
            HostCommand::new("tee")
                .arg(path.to_string_lossy())
                .privileged_if(privileged)
                .stdin(contents),
        );
        self.set_file(path, contents);
        Ok(())
    }

    fn command_exists(&self, name: &str) -> Result<bool, HostError> {
        Ok(lock(&self.commands).contains(name))
    }
}
