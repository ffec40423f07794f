//! Debian packages and third-party apt repositories

use super::{Fetch, apt_get, list, make_dir};
use converge::{
    ApplyContext, ApplyError, Detection, DetectionError, Host, HostCommand, Step,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Status line dpkg reports for a fully installed package
const INSTALLED: &str = "install ok installed";

/// A set of apt packages that must all be installed
#[derive(Debug, Clone)]
pub struct AptPackages {
    name: String,
    packages: Vec<String>,
    critical: bool,
}

impl AptPackages {
    pub fn new(name: impl Into<String>, packages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            packages,
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn is_installed(host: &dyn Host, package: &str) -> Result<bool, converge::HostError> {
        let output = host.run(
            &HostCommand::new("dpkg-query")
                .arg("--showformat=${Status}")
                .arg("--show")
                .arg(package),
        )?;
        // Unknown packages exit 1 with "no packages found matching"
        Ok(output.success() && output.stdout_str().trim() == INSTALLED)
    }

    fn missing(&self, host: &dyn Host) -> Result<Vec<&str>, converge::HostError> {
        let mut missing = Vec::new();
        for package in &self.packages {
            if !Self::is_installed(host, package)? {
                missing.push(package.as_str());
            }
        }
        Ok(missing)
    }
}

impl Step for AptPackages {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Install {}", list(&self.packages))
    }

    fn kind(&self) -> &'static str {
        "apt_packages"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        Ok(Detection::from_satisfied(self.missing(host)?.is_empty()))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        let missing = self.missing(ctx.host)?;
        if missing.is_empty() {
            return Ok("all packages already installed".to_string());
        }

        ctx.host.run_checked(&apt_get(["update", "-q"]))?;
        ctx.host
            .run_checked(&apt_get(["install", "-y", "-q"]).args(missing.iter().copied()))?;

        Ok(format!("installed {}", list(&missing)))
    }
}

/// A signed third-party apt repository (keyring plus sources entry)
///
/// The sources line is rendered against the host at detect time, since the
/// architecture and release codename come from the machine itself.
pub struct AptRepository {
    name: String,
    key_url: String,
    keyring: PathBuf,
    sources: PathBuf,
    url: String,
    suite: Option<String>,
    components: String,
    fetch: Arc<dyn Fetch>,
    critical: bool,
}

impl fmt::Debug for AptRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AptRepository")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("keyring", &self.keyring)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl AptRepository {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        key_url: impl Into<String>,
        fetch: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            name: name.into(),
            key_url: key_url.into(),
            keyring: PathBuf::new(),
            sources: PathBuf::new(),
            url: url.into(),
            suite: None,
            components: "stable".to_string(),
            fetch,
            critical: false,
        }
    }

    pub fn keyring(mut self, path: impl Into<PathBuf>) -> Self {
        self.keyring = path.into();
        self
    }

    pub fn sources(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources = path.into();
        self
    }

    /// Pin the suite instead of using the host's release codename
    pub fn suite(mut self, suite: Option<String>) -> Self {
        self.suite = suite;
        self
    }

    pub fn components(mut self, components: impl Into<String>) -> Self {
        self.components = components.into();
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// The exact contents the sources file should have
    fn sources_entry(&self, host: &dyn Host) -> Result<String, DetectionError> {
        let arch = host.run(&HostCommand::new("dpkg").arg("--print-architecture"))?;
        if !arch.success() {
            return Err(DetectionError::new("cannot determine dpkg architecture"));
        }
        let arch = arch.stdout_str().trim().to_string();

        let suite = match &self.suite {
            Some(suite) => suite.clone(),
            None => {
                let os_release = host
                    .read_file(Path::new("/etc/os-release"))?
                    .ok_or_else(|| DetectionError::new("/etc/os-release is missing"))?;
                release_codename(&os_release).ok_or_else(|| {
                    DetectionError::new("no VERSION_CODENAME in /etc/os-release")
                })?
            }
        };

        Ok(format!(
            "deb [arch={arch} signed-by={}] {} {suite} {}\n",
            self.keyring.display(),
            self.url,
            self.components
        ))
    }
}

/// Release codename from an os-release file (`noble`, `jammy`)
fn release_codename(os_release: &str) -> Option<String> {
    let value = |key: &str| {
        os_release.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.trim().trim_matches('"').to_string())
                .filter(|v| !v.is_empty())
        })
    };
    value("UBUNTU_CODENAME").or_else(|| value("VERSION_CODENAME"))
}

impl Step for AptRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Add apt repository {}", self.url)
    }

    fn kind(&self) -> &'static str {
        "apt_repository"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        if !host.path_exists(&self.keyring)? {
            return Ok(Detection::NeedsApply);
        }
        let wanted = self.sources_entry(host)?;
        let current = host.read_file(&self.sources)?;
        Ok(Detection::from_satisfied(current.as_deref() == Some(wanted.as_str())))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        let entry = self.sources_entry(ctx.host)?;
        let key = self.fetch.fetch(&self.key_url)?;

        if let Some(dir) = self.keyring.parent() {
            ctx.host.run_checked(&make_dir(dir, "0755", true))?;
        }
        ctx.host.run_checked(
            &HostCommand::new("gpg")
                .args(["--dearmor", "--batch", "--yes", "--output"])
                .arg(self.keyring.to_string_lossy())
                .privileged()
                .stdin(key),
        )?;
        ctx.host.run_checked(
            &HostCommand::new("chmod")
                .arg("a+r")
                .arg(self.keyring.to_string_lossy())
                .privileged(),
        )?;

        ctx.host.write_file(&self.sources, &entry, true)?;
        ctx.host.run_checked(&apt_get(["update", "-q"]))?;

        Ok(format!("added {}", entry.trim_end()))
    }
}
