//! # releases
//!
//! Fetch single-binary tools from GitHub releases.
//!
//! A [`ReleaseSpec`] names a repository, an optional tag, an asset name
//! template and the binary inside the asset. [`Client::fetch`] resolves the
//! release, picks the asset for the target [`Platform`], downloads it (with
//! retry on network errors) and returns the executable's bytes. Writing them
//! to disk is left to the caller.
//!
//! ## Example
//!
//! ```no_run
//! use releases::{Client, ReleaseSpec, platform};
//!
//! let client = Client::new();
//! let spec = ReleaseSpec {
//!     repo: "starship/starship".into(),
//!     tag: None,
//!     asset: "starship-{triple}.tar.gz".into(),
//!     binary: "starship".into(),
//! };
//!
//! let platform = platform::detect().expect("unsupported platform");
//! let fetched = client.fetch(&spec, &platform).expect("download failed");
//! println!("starship {} ({} bytes)", fetched.tag, fetched.bytes.len());
//! ```

#![warn(missing_docs)]

pub mod archive;
pub mod backend;
pub mod error;
pub mod platform;
pub mod retry;
pub mod types;

pub use backend::MockBackend;
pub use error::{Error, ErrorCategory, Result};
pub use retry::{LogCallback, RetryCallback, RetryConfig};
pub use types::{FetchedBinary, Platform, Release, ReleaseAsset, ReleaseSpec};

use backend::Backend;
use backend::github::GitHubBackend;

/// High-level client for fetching release binaries.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a new Client with the default GitHub backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(Box::new(GitHubBackend::new()))
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve the release a spec points at.
    pub fn resolve(&self, spec: &ReleaseSpec) -> Result<Release> {
        retry::with_retry(&self.retry, Some(&LogCallback), || match &spec.tag {
            Some(tag) => self.backend.fetch_release(&spec.repo, tag),
            None => self.backend.fetch_latest(&spec.repo),
        })
    }

    /// Download the spec's asset for `platform` and extract its binary.
    ///
    /// When a release has no glibc asset for the platform, its musl build is
    /// used instead.
    pub fn fetch(&self, spec: &ReleaseSpec, platform: &Platform) -> Result<FetchedBinary> {
        let release = self.resolve(spec)?;
        let expected = spec.asset_name(&release, platform);

        let asset = release
            .find_asset(&expected)
            .or_else(|| {
                let musl = platform::to_musl_triple(&platform.triple)?;
                let musl = Platform::new(platform.os.as_str(), platform.arch.as_str(), musl);
                let fallback = spec.asset_name(&release, &musl);
                log::debug!("no asset {expected}, trying {fallback}");
                release.find_asset(&fallback)
            })
            .ok_or_else(|| Error::AssetNotFound {
                repo: spec.repo.clone(),
                tag: release.tag.clone(),
                expected: expected.clone(),
            })?;

        log::info!("downloading {} from {} {}", asset.name, spec.repo, release.tag);
        let data = retry::with_retry(&self.retry, Some(&LogCallback), || {
            self.backend.download(asset)
        })?;

        let bytes = archive::extract_binary(asset, &data, &spec.binary)?;

        Ok(FetchedBinary {
            tag: release.tag.clone(),
            asset: asset.name.clone(),
            bytes,
        })
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
