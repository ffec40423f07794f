//! Host command interface
//!
//! Steps never touch the machine directly. Everything goes through a [`Host`],
//! which keeps detection and apply logic testable against [`crate::FakeHost`].

use crate::error::{ApplyError, HostError};
use std::fmt;
use std::path::Path;
use std::process::Output;

/// A command to run on the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Run with elevated privileges
    pub privileged: bool,
    /// Bytes written to the command's stdin
    pub stdin: Option<Vec<u8>>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn privileged(self) -> Self {
        self.privileged_if(true)
    }

    pub fn privileged_if(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Command line as shown to the operator (`program arg1 arg2`)
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.privileged {
            write!(f, "[sudo] ")?;
        }
        write!(f, "{}", self.display())
    }
}

/// Exit code and captured streams of a host command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Turn a non-zero exit into an [`ApplyError`] carrying stderr verbatim
    pub fn check(self, command: &HostCommand) -> Result<Self, ApplyError> {
        if self.success() {
            return Ok(self);
        }

        let status = self
            .code
            .map_or_else(|| "killed by signal".to_string(), |c| format!("exit status {c}"));
        let stderr = self.stderr_str();
        let stderr = stderr.trim();

        if stderr.is_empty() {
            Err(ApplyError::new(format!("`{}` failed ({status})", command.display())))
        } else {
            Err(ApplyError::new(format!(
                "`{}` failed ({status}): {stderr}",
                command.display()
            )))
        }
    }
}

/// The only way steps read or change the machine
///
/// Implementors provide [`Host::run`]; the file helpers have default
/// implementations in terms of coreutils so a minimal host only needs `run`.
pub trait Host: Send + Sync {
    /// Run a command and capture its output
    ///
    /// A non-zero exit is not an error here, callers interpret exit codes.
    fn run(&self, command: &HostCommand) -> Result<CommandOutput, HostError>;

    /// Run a command, treating any non-zero exit as an apply failure
    fn run_checked(&self, command: &HostCommand) -> Result<CommandOutput, ApplyError> {
        self.run(command)?.check(command)
    }

    /// Whether a path exists
    fn path_exists(&self, path: &Path) -> Result<bool, HostError> {
        let command = HostCommand::new("test")
            .arg("-e")
            .arg(path.to_string_lossy());
        Ok(self.run(&command)?.success())
    }

    /// Read a file, `None` if it does not exist
    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        if !self.path_exists(path)? {
            return Ok(None);
        }

        let command = HostCommand::new("cat").arg(path.to_string_lossy());
        let output = self.run(&command)?;
        if !output.success() {
            return Err(HostError::new(command.display(), output.stderr_str().trim()));
        }
        Ok(Some(output.stdout_str()))
    }

    /// Replace a file's contents
    fn write_file(&self, path: &Path, contents: &str, privileged: bool) -> Result<(), ApplyError> {
        let command = HostCommand::new("tee")
            .arg(path.to_string_lossy())
            .privileged_if(privileged)
            .stdin(contents);
        self.run_checked(&command)?;
        Ok(())
    }

    /// Whether an executable is on `$PATH`
    fn command_exists(&self, name: &str) -> Result<bool, HostError> {
        let command = HostCommand::new("sh")
            .args(["-c", "command -v \"$1\"", "sh"])
            .arg(name);
        Ok(self.run(&command)?.success())
    }
}
