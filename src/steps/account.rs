//! User account settings: login shell and supplementary groups

use converge::{
    ApplyContext, ApplyError, Detection, DetectionError, Host, HostCommand, Step,
};
use std::path::Path;

/// The user's login shell as recorded in the passwd database
#[derive(Debug, Clone)]
pub struct LoginShell {
    name: String,
    user: String,
    shell: String,
    critical: bool,
}

impl LoginShell {
    pub fn new(name: impl Into<String>, user: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
            shell: shell.into(),
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn current_shell(&self, host: &dyn Host) -> Result<String, DetectionError> {
        let output = host.run(&HostCommand::new("getent").args(["passwd", &self.user]))?;
        if !output.success() {
            return Err(DetectionError::new(format!("no passwd entry for {}", self.user)));
        }
        passwd_shell(&output.stdout_str())
            .map(str::to_string)
            .ok_or_else(|| DetectionError::new(format!("malformed passwd entry for {}", self.user)))
    }
}

/// Shell field (7th) of a passwd line
fn passwd_shell(entry: &str) -> Option<&str> {
    entry.lines().next()?.split(':').nth(6).map(str::trim)
}

impl Step for LoginShell {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Set login shell of {} to {}", self.user, self.shell)
    }

    fn kind(&self) -> &'static str {
        "login_shell"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        Ok(Detection::from_satisfied(self.current_shell(host)? == self.shell))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        let shells = ctx.host.read_file(Path::new("/etc/shells"))?.unwrap_or_default();
        if !shells.lines().any(|line| line.trim() == self.shell) {
            return Err(ApplyError::new(format!(
                "{} is not listed in /etc/shells",
                self.shell
            )));
        }

        ctx.host.run_checked(
            &HostCommand::new("chsh")
                .args(["-s", &self.shell, &self.user])
                .privileged(),
        )?;
        Ok(format!(
            "login shell is now {} (takes effect at next login)",
            self.shell
        ))
    }
}

/// Membership of a user in a supplementary group
#[derive(Debug, Clone)]
pub struct GroupMembership {
    name: String,
    user: String,
    group: String,
    critical: bool,
}

impl GroupMembership {
    pub fn new(name: impl Into<String>, user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
            group: group.into(),
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}

impl Step for GroupMembership {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Add {} to group {}", self.user, self.group)
    }

    fn kind(&self) -> &'static str {
        "group_membership"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        let output = host.run(&HostCommand::new("id").args(["-nG", &self.user]))?;
        if !output.success() {
            return Err(DetectionError::new(format!("unknown user {}", self.user)));
        }
        let member = output
            .stdout_str()
            .split_whitespace()
            .any(|g| g == self.group);
        Ok(Detection::from_satisfied(member))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        ctx.host.run_checked(
            &HostCommand::new("usermod")
                .args(["-aG", &self.group, &self.user])
                .privileged(),
        )?;
        Ok(format!(
            "{} added to {} (takes effect at next login)",
            self.user, self.group
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::{CommandOutput, FakeHost};

    const SHELLS: &str = "# /etc/shells: valid login shells\n/bin/sh\n/bin/bash\n/usr/bin/zsh\n";

    fn passwd(shell: &str) -> CommandOutput {
        CommandOutput::ok(format!("dev:x:1000:1000:Dev,,,:/home/dev:{shell}\n"))
    }

    #[test]
    fn test_passwd_shell() {
        assert_eq!(
            passwd_shell("dev:x:1000:1000::/home/dev:/usr/bin/zsh\n"),
            Some("/usr/bin/zsh")
        );
        assert_eq!(passwd_shell("broken"), None);
    }

    #[test]
    fn test_login_shell_detect() {
        let host = FakeHost::new();
        host.respond("getent passwd dev", passwd("/usr/bin/zsh"));
        let step = LoginShell::new("login-shell", "dev", "/usr/bin/zsh");
        assert_eq!(step.detect(&host).unwrap(), Detection::AlreadySatisfied);

        host.respond("getent passwd dev", passwd("/bin/bash"));
        assert_eq!(step.detect(&host).unwrap(), Detection::NeedsApply);
    }

    #[test]
    fn test_login_shell_unknown_user_is_detection_error() {
        let host = FakeHost::new();
        host.respond("getent passwd ghost", CommandOutput::failed(2, ""));
        let step = LoginShell::new("login-shell", "ghost", "/usr/bin/zsh");
        assert!(step.detect(&host).is_err());
    }

    #[test]
    fn test_login_shell_apply() {
        let host = FakeHost::new().with_file("/etc/shells", SHELLS);
        let step = LoginShell::new("login-shell", "dev", "/usr/bin/zsh");

        step.apply(&ApplyContext::new(&host, false)).unwrap();

        let chsh = host.command_log().pop().unwrap();
        assert_eq!(chsh.display(), "chsh -s /usr/bin/zsh dev");
        assert!(chsh.privileged);
    }

    #[test]
    fn test_login_shell_refuses_unlisted_shell() {
        let host = FakeHost::new().with_file("/etc/shells", SHELLS);
        let step = LoginShell::new("login-shell", "dev", "/usr/local/bin/fish");

        let err = step.apply(&ApplyContext::new(&host, false)).unwrap_err();
        assert_eq!(err.diagnostic(), "/usr/local/bin/fish is not listed in /etc/shells");
        assert!(!host.ran("chsh"));
    }

    #[test]
    fn test_group_membership() {
        let host = FakeHost::new();
        host.respond("id -nG dev", CommandOutput::ok("dev adm sudo\n"));
        let step = GroupMembership::new("docker-group", "dev", "docker");
        assert_eq!(step.detect(&host).unwrap(), Detection::NeedsApply);

        step.apply(&ApplyContext::new(&host, false)).unwrap();
        assert!(host.ran("usermod -aG docker dev"));

        host.respond("id -nG dev", CommandOutput::ok("dev adm sudo docker\n"));
        assert_eq!(step.detect(&host).unwrap(), Detection::AlreadySatisfied);
    }

    #[test]
    fn test_group_name_must_match_whole_word() {
        let host = FakeHost::new();
        host.respond("id -nG dev", CommandOutput::ok("dev dockerd\n"));
        let step = GroupMembership::new("docker-group", "dev", "docker");
        assert_eq!(step.detect(&host).unwrap(), Detection::NeedsApply);
    }
}
