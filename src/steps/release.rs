//! Single-binary tools installed from GitHub releases

use converge::{ApplyContext, ApplyError, Detection, DetectionError, Host, HostCommand, Step};
use releases::{Client, Platform, ReleaseSpec};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A release binary installed at `<bin_dir>/<binary>`
pub struct ReleaseBinary {
    name: String,
    spec: ReleaseSpec,
    target: PathBuf,
    client: Arc<Client>,
    platform: Option<Platform>,
    critical: bool,
}

impl fmt::Debug for ReleaseBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseBinary")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl ReleaseBinary {
    pub fn new(
        name: impl Into<String>,
        spec: ReleaseSpec,
        bin_dir: impl Into<PathBuf>,
        client: Arc<Client>,
    ) -> Self {
        let target = bin_dir.into().join(&spec.binary);
        Self {
            name: name.into(),
            spec,
            target,
            client,
            platform: None,
            critical: false,
        }
    }

    /// Use a fixed platform instead of detecting the running one
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    fn resolve_platform(&self) -> Result<Platform, ApplyError> {
        match &self.platform {
            Some(platform) => Ok(platform.clone()),
            None => releases::platform::detect().map_err(|e| ApplyError::new(e.to_string())),
        }
    }
}

impl Step for ReleaseBinary {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        let tag = self.spec.tag.as_deref().unwrap_or("latest");
        format!(
            "Install {} ({} {tag}) to {}",
            self.spec.binary,
            self.spec.repo,
            self.target.display()
        )
    }

    fn kind(&self) -> &'static str {
        "release_binary"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn detect(&self, host: &dyn Host) -> Result<Detection, DetectionError> {
        let output = host.run(
            &HostCommand::new("test")
                .arg("-x")
                .arg(self.target.to_string_lossy()),
        )?;
        Ok(Detection::from_satisfied(output.success()))
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<String, ApplyError> {
        let platform = self.resolve_platform()?;
        let fetched = self.client.fetch(&self.spec, &platform).map_err(|e| {
            let category = e.category();
            ApplyError::new(format!("{e} ({})", category.advice()))
        })?;

        let privileged = super::needs_privilege(&self.target);
        if let Some(dir) = self.target.parent() {
            ctx.host.run_checked(&super::make_dir(dir, "0755", privileged))?;
        }

        // Write beside the target, then rename over it
        let staged = self.target.with_extension("primer-new");
        ctx.host.run_checked(
            &HostCommand::new("dd")
                .arg(format!("of={}", staged.display()))
                .arg("status=none")
                .privileged_if(privileged)
                .stdin(fetched.bytes),
        )?;
        ctx.host.run_checked(
            &HostCommand::new("chmod")
                .arg("0755")
                .arg(staged.to_string_lossy())
                .privileged_if(privileged),
        )?;
        ctx.host.run_checked(
            &HostCommand::new("mv")
                .arg("-f")
                .arg(staged.to_string_lossy())
                .arg(self.target.to_string_lossy())
                .privileged_if(privileged),
        )?;

        Ok(format!(
            "installed {} {} from {}",
            self.spec.binary, fetched.tag, fetched.asset
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::{CommandOutput, FakeHost};
    use releases::{MockBackend, Release, ReleaseAsset, RetryConfig};

    const ASSET: &str = "starship-x86_64-unknown-linux-gnu.tar.gz";

    fn targz(path: &str, data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
            builder.finish().unwrap();
        }
        encoder.finish().unwrap()
    }

    fn client(with_asset: bool) -> Arc<Client> {
        let mut mock = MockBackend::new();
        mock.add_release(
            "starship/starship",
            Release {
                tag: "v1.20.1".into(),
                name: "v1.20.1".into(),
                prerelease: false,
                assets: vec![ReleaseAsset {
                    name: ASSET.into(),
                    download_url: format!("mock://{ASSET}"),
                    size: 0,
                }],
            },
        );
        if with_asset {
            mock.add_asset(ASSET, targz("starship", b"\x7fELF"));
        }
        Arc::new(Client::with_backend(Box::new(mock)).retry(RetryConfig::no_retry()))
    }

    fn step(client: Arc<Client>, bin_dir: &str) -> ReleaseBinary {
        ReleaseBinary::new(
            "install-starship",
            ReleaseSpec {
                repo: "starship/starship".into(),
                tag: None,
                asset: "starship-{triple}.tar.gz".into(),
                binary: "starship".into(),
            },
            bin_dir,
            client,
        )
        .platform(Platform::new("linux", "x86_64", "x86_64-unknown-linux-gnu"))
    }

    #[test]
    fn test_detect_checks_executable_bit() {
        let host = FakeHost::new();
        let step = step(client(true), "/usr/local/bin");
        host.respond("test -x /usr/local/bin/starship", CommandOutput::failed(1, ""));
        assert_eq!(step.detect(&host).unwrap(), Detection::NeedsApply);

        host.respond("test -x /usr/local/bin/starship", CommandOutput::ok(""));
        assert_eq!(step.detect(&host).unwrap(), Detection::AlreadySatisfied);
    }

    #[test]
    fn test_apply_stages_then_renames() {
        let host = FakeHost::new();
        let detail = step(client(true), "/usr/local/bin")
            .apply(&ApplyContext::new(&host, false))
            .unwrap();

        assert_eq!(detail, format!("installed starship v1.20.1 from {ASSET}"));
        assert_eq!(
            host.commands(),
            vec![
                "install -d -m 0755 /usr/local/bin",
                "dd of=/usr/local/bin/starship.primer-new status=none",
                "chmod 0755 /usr/local/bin/starship.primer-new",
                "mv -f /usr/local/bin/starship.primer-new /usr/local/bin/starship",
            ]
        );
        let log = host.command_log();
        assert!(log.iter().all(|c| c.privileged));
        assert_eq!(log[1].stdin.as_deref(), Some(b"\x7fELF".as_slice()));
    }

    #[test]
    fn test_download_failure_leaves_host_untouched() {
        let host = FakeHost::new();
        let err = step(client(false), "/usr/local/bin")
            .apply(&ApplyContext::new(&host, false))
            .unwrap_err();

        assert!(err.diagnostic().contains("mock asset not configured"));
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_description_names_tag() {
        assert_eq!(
            step(client(true), "/usr/local/bin").description(),
            "Install starship (starship/starship latest) to /usr/local/bin/starship"
        );
    }
}
