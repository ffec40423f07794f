//! Git checkouts and global git settings

use converge::{
    ApplyContext, ApplyError, Detection, DetectionError, Host, HostCommand, Step,
};
use std::path::PathBuf;

/// A shallow clone of a repository at a fixed destination
#[derive(Debug, Clone)]
pub struct GitClone {
    name: String,
    url: String,
    dest: PathBuf,
    critical: bool,
}

impl GitClone {
    pub fn new(name: impl Into<String>, url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            dest: dest.into(),
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}

impl Step for GitClone {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Clone {} into {}", self.url, self.dest.display())
    }

    fn kind(&self) -> &'static str {
        "git_clone"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        Ok(Detection::from_satisfied(
            host.path_exists(&self.dest.join(".git"))?,
        ))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        // Left behind by an interrupted clone, or by hand; git refuses to clone over it
        if ctx.host.path_exists(&self.dest)? {
            return Err(ApplyError::new(format!(
                "{} exists but is not a git repository; remove it and run again",
                self.dest.display()
            )));
        }
        if let Some(parent) = self.dest.parent() {
            ctx.host
                .run_checked(&HostCommand::new("mkdir").arg("-p").arg(parent.to_string_lossy()))?;
        }
        ctx.host.run_checked(
            &HostCommand::new("git")
                .args(["clone", "--depth", "1", "--quiet", &self.url])
                .arg(self.dest.to_string_lossy()),
        )?;
        Ok(format!("cloned into {}", self.dest.display()))
    }
}

/// A group of `git config --global` settings
#[derive(Debug, Clone)]
pub struct GitConfig {
    name: String,
    settings: Vec<(String, String)>,
    critical: bool,
}

impl GitConfig {
    pub fn new(name: impl Into<String>, settings: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            settings,
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn current(host: &dyn Host, key: &str) -> Result<Option<String>, converge::HostError> {
        let output = host.run(&HostCommand::new("git").args(["config", "--global", "--get", key]))?;
        // Exit 1 means the key is unset
        Ok(output
            .success()
            .then(|| output.stdout_str().trim_end_matches('\n').to_string()))
    }

    fn pending(&self, host: &dyn Host) -> Result<Vec<&(String, String)>, converge::HostError> {
        let mut pending = Vec::new();
        for setting in &self.settings {
            if Self::current(host, &setting.0)?.as_deref() != Some(setting.1.as_str()) {
                pending.push(setting);
            }
        }
        Ok(pending)
    }
}

impl Step for GitConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        let keys: Vec<&str> = self.settings.iter().map(|(k, _)| k.as_str()).collect();
        format!("Set git {}", keys.join(", "))
    }

    fn kind(&self) -> &'static str {
        "git_config"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        Ok(Detection::from_satisfied(self.pending(host)?.is_empty()))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        let pending = self.pending(ctx.host)?;
        for (key, value) in &pending {
            ctx.host
                .run_checked(&HostCommand::new("git").args(["config", "--global", key, value]))?;
        }
        let keys: Vec<&str> = pending.iter().map(|(k, _)| k.as_str()).collect();
        Ok(format!("set {}", keys.join(", ")))
    }
}
