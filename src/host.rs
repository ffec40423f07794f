//! The machine primer runs on

use converge::{CommandOutput, Host, HostCommand, HostError};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::{fs, thread};

/// Runs commands with `std::process`, elevating through `sudo -n`
///
/// `sudo` never prompts here: the keep-alive grant is acquired up front, so a
/// privileged command without a grant fails instead of hanging on a password.
#[derive(Debug, Clone, Copy)]
pub struct SystemHost {
    root: bool,
}

impl SystemHost {
    pub fn new() -> Self {
        Self { root: is_root() }
    }

    /// Whether privileged commands are run through sudo at all
    pub fn needs_sudo(&self) -> bool {
        !self.root
    }

    fn build(&self, command: &HostCommand) -> Command {
        let mut process = if command.privileged && !self.root {
            let mut sudo = Command::new("sudo");
            sudo.arg("-n");
            // sudo resets the environment, so pass variables through env(1)
            if !command.env.is_empty() {
                sudo.arg("env");
                sudo.args(command.env.iter().map(|(k, v)| format!("{k}={v}")));
            }
            sudo.arg(&command.program);
            sudo
        } else {
            let mut direct = Command::new(&command.program);
            direct.envs(command.env.iter().map(|(k, v)| (k, v)));
            direct
        };

        process
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        process
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if the effective user is root
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

impl Host for SystemHost {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput, HostError> {
        log::debug!("running: {command}");
        let fail = |e: std::io::Error| HostError::new(command.display(), e.to_string());

        let mut child = self.build(command).spawn().map_err(fail)?;

        let output = match (&command.stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => thread::scope(|scope| {
                // Feed stdin while output is drained, or a chatty child blocks on a full pipe
                let writer = scope.spawn(move || match pipe.write_all(input) {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                });
                let output = child.wait_with_output();
                let written = writer
                    .join()
                    .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
                written.and(output)
            }),
            _ => child.wait_with_output(),
        }
        .map_err(fail)?;

        let output = CommandOutput::from(output);
        if !output.success() {
            log::debug!("`{command}` exited with {:?}", output.code);
        }
        Ok(output)
    }

    fn path_exists(&self, path: &Path) -> Result<bool, HostError> {
        match path.try_exists() {
            Ok(exists) => Ok(exists),
            Err(e) => {
                log::debug!("cannot stat {}: {e}, asking sudo", path.display());
                let command = HostCommand::new("test")
                    .arg("-e")
                    .arg(path.to_string_lossy())
                    .privileged();
                Ok(self.run(&command)?.success())
            }
        }
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                let command = HostCommand::new("cat")
                    .arg(path.to_string_lossy())
                    .privileged();
                let output = self.run(&command)?;
                if !output.success() {
                    return Err(HostError::new(command.display(), output.stderr_str().trim()));
                }
                Ok(Some(output.stdout_str()))
            }
            Err(e) => Err(HostError::new(
                format!("read {}", path.display()),
                e.to_string(),
            )),
        }
    }

    fn command_exists(&self, name: &str) -> Result<bool, HostError> {
        Ok(which::which(name).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host() -> SystemHost {
        SystemHost { root: false }
    }

    #[test]
    fn test_captures_exit_code_and_streams() {
        let out = host()
            .run(&HostCommand::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout_str(), "out\n");
        assert_eq!(out.stderr_str(), "err\n");
    }

    #[test]
    fn test_stdin_is_fed() {
        let input = "line\n".repeat(50_000);
        let out = host()
            .run(&HostCommand::new("cat").stdin(input.clone()))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_str(), input);
    }

    #[test]
    fn test_env_reaches_unprivileged_command() {
        let out = host()
            .run(
                &HostCommand::new("sh")
                    .args(["-c", "printf %s \"$PRIMER_TEST\""])
                    .env("PRIMER_TEST", "yes"),
            )
            .unwrap();
        assert_eq!(out.stdout_str(), "yes");
    }

    #[test]
    fn test_privileged_command_goes_through_sudo() {
        let command = HostCommand::new("apt-get")
            .args(["install", "-y", "zsh"])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .privileged();
        let built = host().build(&command);

        assert_eq!(built.get_program(), "sudo");
        let args: Vec<_> = built.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["-n", "env", "DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y", "zsh"]
        );
    }

    #[test]
    fn test_root_runs_privileged_directly() {
        let built = SystemHost { root: true }.build(&HostCommand::new("chsh").privileged());
        assert_eq!(built.get_program(), "chsh");
    }

    #[test]
    fn test_spawn_failure_is_host_error() {
        let err = host()
            .run(&HostCommand::new("primer-definitely-missing"))
            .unwrap_err();
        assert_eq!(err.command, "primer-definitely-missing");
    }

    #[test]
    fn test_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shells");
        assert_eq!(host().read_file(&path).unwrap(), None);
        assert!(!host().path_exists(&path).unwrap());

        fs::write(&path, "/bin/bash\n").unwrap();
        assert_eq!(host().read_file(&path).unwrap().as_deref(), Some("/bin/bash\n"));
        assert!(host().path_exists(&path).unwrap());
    }

    #[test]
    fn test_command_exists() {
        assert!(host().command_exists("sh").unwrap());
        assert!(!host().command_exists("primer-definitely-missing").unwrap());
    }
}
