//! SSH access: operator keys and sshd hardening

use super::{Fetch, make_dir, needs_privilege};
use converge::{ApplyContext, ApplyError, Detection, DetectionError, Host, HostCommand, Step};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key type and base64 blob of an authorized_keys or `.keys` line
///
/// Options before the key type and the trailing comment are ignored, so the
/// same key with a different comment counts as present.
fn key_id(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split_whitespace().skip_while(|f| !is_key_type(f));
    Some((fields.next()?, fields.next()?))
}

fn is_key_type(field: &str) -> bool {
    field.starts_with("ssh-") || field.starts_with("ecdsa-sha2-") || field.starts_with("sk-")
}

fn key_ids(contents: &str) -> Vec<(&str, &str)> {
    contents.lines().filter_map(key_id).collect()
}

/// Public keys published for a GitHub account, present in `~/.ssh/authorized_keys`
pub struct AuthorizedKeys {
    name: String,
    account: String,
    keys_url: String,
    ssh_dir: PathBuf,
    fetch: Arc<dyn Fetch>,
    critical: bool,
}

impl fmt::Debug for AuthorizedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedKeys")
            .field("name", &self.name)
            .field("account", &self.account)
            .field("keys_url", &self.keys_url)
            .field("ssh_dir", &self.ssh_dir)
            .finish_non_exhaustive()
    }
}

impl AuthorizedKeys {
    /// `keys_url` may contain `{account}`
    pub fn new(
        name: impl Into<String>,
        account: impl Into<String>,
        keys_url: &str,
        ssh_dir: impl Into<PathBuf>,
        fetch: Arc<dyn Fetch>,
    ) -> Self {
        let account = account.into();
        Self {
            name: name.into(),
            keys_url: keys_url.replace("{account}", &account),
            account,
            ssh_dir: ssh_dir.into(),
            fetch,
            critical: false,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn file(&self) -> PathBuf {
        self.ssh_dir.join("authorized_keys")
    }

    fn published(&self) -> Result<String, ApplyError> {
        let body = self.fetch.fetch(&self.keys_url)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl Step for AuthorizedKeys {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Authorize SSH keys of {} ({})", self.account, self.keys_url)
    }

    fn kind(&self) -> &'static str {
        "authorized_keys"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        let published = self.published().map_err(|e| DetectionError::new(e.0))?;
        let published = key_ids(&published);
        if published.is_empty() {
            return Ok(Detection::NeedsApply);
        }

        let existing = host.read_file(&self.file())?.unwrap_or_default();
        let existing = key_ids(&existing);
        Ok(Detection::from_satisfied(
            published.iter().all(|k| existing.contains(k)),
        ))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        let published = self.published()?;
        let published: Vec<&str> = published.lines().filter(|l| key_id(l).is_some()).collect();
        if published.is_empty() {
            return Err(ApplyError::new(format!(
                "no public keys published at {}",
                self.keys_url
            )));
        }

        let file = self.file();
        let privileged = needs_privilege(&file);
        ctx.host.run_checked(&make_dir(&self.ssh_dir, "0700", privileged))?;

        let mut contents = ctx.host.read_file(&file)?.unwrap_or_default();
        let mut known: Vec<(String, String)> = key_ids(&contents)
            .into_iter()
            .map(|(t, b)| (t.to_string(), b.to_string()))
            .collect();

        let mut added = 0;
        for line in published {
            let Some((kind, blob)) = key_id(line) else {
                continue;
            };
            if known.iter().any(|(t, b)| t == kind && b == blob) {
                continue;
            }
            if !contents.is_empty() && !contents.ends_with('\n') {
                contents.push('\n');
            }
            contents.push_str(line.trim());
            contents.push('\n');
            known.push((kind.to_string(), blob.to_string()));
            added += 1;
        }

        if added > 0 {
            ctx.host.write_file(&file, &contents, privileged)?;
        }

        for (mode, path) in [("0700", &self.ssh_dir), ("0600", &file)] {
            ctx.host.run_checked(
                &HostCommand::new("chmod")
                    .arg(mode)
                    .arg(path.to_string_lossy())
                    .privileged_if(privileged),
            )?;
        }

        Ok(format!("added {added} key(s) for {}", self.account))
    }
}

/// An sshd drop-in that disables password logins
///
/// Applying refuses to run while `authorized_keys` holds no key, so a host is
/// never left without a way in.
#[derive(Debug, Clone)]
pub struct SshdHardening {
    name: String,
    dropin: PathBuf,
    settings: Vec<String>,
    authorized_keys: PathBuf,
    service: String,
    critical: bool,
}

impl SshdHardening {
    pub fn new(
        name: impl Into<String>,
        dropin: impl Into<PathBuf>,
        settings: Vec<String>,
        authorized_keys: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            dropin: dropin.into(),
            settings,
            authorized_keys: authorized_keys.into(),
            service: "ssh".to_string(),
            critical: false,
        }
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn contents(&self) -> String {
        let mut contents = String::from("# Managed by primer\n");
        for setting in &self.settings {
            contents.push_str(setting);
            contents.push('\n');
        }
        contents
    }

    /// Put the drop-in back the way it was before this apply
    fn restore_dropin(&self, host: &dyn Host, previous: Option<&str>) {
        let restored = match previous {
            Some(contents) => host.write_file(&self.dropin, contents, true),
            None => host.run_checked(
                &HostCommand::new("rm")
                    .arg("-f")
                    .arg(self.dropin.to_string_lossy())
                    .privileged(),
            )
            .map(drop),
        };
        if let Err(e) = restored {
            log::warn!("could not restore {}: {e}", self.dropin.display());
        }
    }
}

impl Step for SshdHardening {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Harden sshd via {}", self.dropin.display())
    }

    fn kind(&self) -> &'static str {
        "sshd_hardening"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        let current = host.read_file(&self.dropin)?;
        Ok(Detection::from_satisfied(
            current.as_deref() == Some(self.contents().as_str()),
        ))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        // The key step may have failed earlier in the run
        let keys = ctx.host.read_file(&self.authorized_keys)?.unwrap_or_default();
        if key_ids(&keys).is_empty() {
            return Err(ApplyError::new(format!(
                "refusing to disable password login: no keys in {}",
                self.authorized_keys.display()
            )));
        }

        if let Some(dir) = self.dropin.parent() {
            ctx.host.run_checked(&make_dir(dir, "0755", true))?;
        }
        let previous = ctx.host.read_file(&self.dropin)?;
        ctx.host.write_file(&self.dropin, &self.contents(), true)?;

        let check = HostCommand::new("sshd").arg("-t").privileged();
        if let Err(e) = ctx.host.run_checked(&check) {
            self.restore_dropin(ctx.host, previous.as_deref());
            return Err(e);
        }

        ctx.host.run_checked(
            &HostCommand::new("systemctl")
                .args(["restart", &self.service])
                .privileged(),
        )?;

        Ok(format!(
            "wrote {} and restarted {}",
            self.dropin.display(),
            self.service
        ))
    }
}

/// Default `authorized_keys` location for a home directory
pub fn authorized_keys_path(home: &Path) -> PathBuf {
    home.join(".ssh").join("authorized_keys")
}
