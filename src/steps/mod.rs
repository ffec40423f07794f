//! Concrete provisioning steps
//!
//! Every step follows the same shape: a cheap `detect` against the host, and
//! an `apply` that re-checks whatever it can before changing anything. Steps
//! own their data, are built once by [`crate::plan`] and never mutated.

mod account;
mod apt;
mod file;
mod git;
mod release;
mod ssh;

pub use account::{GroupMembership, LoginShell};
pub use apt::{AptPackages, AptRepository};
pub use file::LineInFile;
pub use git::{GitClone, GitConfig};
pub use release::ReleaseBinary;
pub use ssh::{AuthorizedKeys, SshdHardening, authorized_keys_path};

use converge::{ApplyError, HostCommand};
use std::path::Path;
use std::time::Duration;

/// Read-only HTTP access for steps that download small artifacts
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ApplyError>;
}

/// Largest artifact a step downloads through [`Fetch`] (keys, not binaries)
const MAX_FETCH_SIZE: u64 = 1024 * 1024;

/// [`Fetch`] over HTTPS with ureq
pub struct HttpFetch {
    agent: ureq::Agent,
}

impl HttpFetch {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ApplyError> {
        log::debug!("GET {url}");
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", concat!("primer/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| ApplyError::new(format!("failed to download {url}: {e}")))?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_FETCH_SIZE)
            .read_to_vec()
            .map_err(|e| ApplyError::new(format!("failed to read {url}: {e}")))
    }
}

/// `apt-get` with a non-interactive frontend, always privileged
fn apt_get<I, S>(args: I) -> HostCommand
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HostCommand::new("apt-get")
        .args(args)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .privileged()
}

/// `install -d -m <mode> <dir>`, creating parents as needed
fn make_dir(dir: &Path, mode: &str, privileged: bool) -> HostCommand {
    HostCommand::new("install")
        .args(["-d", "-m", mode])
        .arg(dir.to_string_lossy())
        .privileged_if(privileged)
}

/// Whether writing to `path` needs elevation (anything outside `$HOME`)
fn needs_privilege(path: &Path) -> bool {
    dirs::home_dir().is_none_or(|home| !path.starts_with(home))
}

/// Join names for a step detail (`a, b, c`)
fn list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Fetch;
    use converge::ApplyError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// [`Fetch`] serving fixed bodies by URL
    #[derive(Default)]
    pub struct StaticFetch {
        bodies: HashMap<String, Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl StaticFetch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Fetch for StaticFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ApplyError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| ApplyError::new(format!("failed to download {url}: http status: 404")))
        }
    }
}
