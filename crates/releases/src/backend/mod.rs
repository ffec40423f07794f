//! Backend traits and implementations for fetching releases.
//!
//! [`github::GitHubBackend`] talks to GitHub's Releases API. Use
//! [`MockBackend`] for testing without network access:
//!
//! ```
//! use releases::backend::{Backend, MockBackend};
//! use releases::{Release, ReleaseAsset};
//!
//! let mut mock = MockBackend::new();
//! mock.add_release("starship/starship", Release {
//!     tag: "v1.20.1".to_string(),
//!     name: "v1.20.1".to_string(),
//!     prerelease: false,
//!     assets: vec![],
//! });
//!
//! let latest = mock.fetch_latest("starship/starship").unwrap();
//! assert_eq!(latest.tag, "v1.20.1");
//! ```

pub mod github;

use crate::error::{Error, Result};
use crate::types::{Release, ReleaseAsset};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Source of releases and their assets.
pub trait Backend: Send + Sync {
    /// Fetch the newest non-prerelease release of a repository.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReleaseNotFound` if the repository has no releases.
    fn fetch_latest(&self, repo: &str) -> Result<Release>;

    /// Fetch a specific release by tag.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReleaseNotFound` if the tag doesn't exist.
    fn fetch_release(&self, repo: &str, tag: &str) -> Result<Release>;

    /// Download the raw bytes of an asset.
    fn download(&self, asset: &ReleaseAsset) -> Result<Vec<u8>>;
}

/// In-memory backend keyed by repository and asset name.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    releases: Arc<Mutex<HashMap<String, Vec<Release>>>>,
    assets: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    downloads: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a release; releases added later count as newer.
    pub fn add_release(&mut self, repo: impl Into<String>, release: Release) {
        lock(&self.releases)
            .entry(repo.into())
            .or_default()
            .push(release);
    }

    /// Add asset data for a given asset name.
    pub fn add_asset(&mut self, name: impl Into<String>, data: Vec<u8>) {
        lock(&self.assets).insert(name.into(), data);
    }

    /// Names of the assets downloaded so far, in order.
    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        lock(&self.downloads).clone()
    }
}

impl Backend for MockBackend {
    fn fetch_latest(&self, repo: &str) -> Result<Release> {
        lock(&self.releases)
            .get(repo)
            .and_then(|r| r.iter().rev().find(|release| !release.prerelease))
            .cloned()
            .ok_or_else(|| Error::ReleaseNotFound {
                repo: repo.to_string(),
                tag: "latest".to_string(),
            })
    }

    fn fetch_release(&self, repo: &str, tag: &str) -> Result<Release> {
        lock(&self.releases)
            .get(repo)
            .and_then(|r| r.iter().find(|release| release.tag == tag))
            .cloned()
            .ok_or_else(|| Error::ReleaseNotFound {
                repo: repo.to_string(),
                tag: tag.to_string(),
            })
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        lock(&self.downloads).push(asset.name.clone());
        lock(&self.assets)
            .get(&asset.name)
            .cloned()
            .ok_or_else(|| Error::http(format!("mock asset not configured: {}", asset.name), Some(404)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, prerelease: bool) -> Release {
        Release {
            tag: tag.to_string(),
            name: tag.to_string(),
            prerelease,
            assets: vec![ReleaseAsset {
                name: format!("tool-{tag}.tar.gz"),
                download_url: format!("mock://tool-{tag}.tar.gz"),
                size: 4,
            }],
        }
    }

    #[test]
    fn test_latest_skips_prereleases() {
        let mut mock = MockBackend::new();
        mock.add_release("o/tool", release("v1.0.0", false));
        mock.add_release("o/tool", release("v1.1.0", false));
        mock.add_release("o/tool", release("v2.0.0-rc1", true));

        assert_eq!(mock.fetch_latest("o/tool").unwrap().tag, "v1.1.0");
    }

    #[test]
    fn test_latest_without_releases() {
        let mock = MockBackend::new();
        let err = mock.fetch_latest("o/none").unwrap_err();
        assert!(matches!(err, Error::ReleaseNotFound { .. }));
    }

    #[test]
    fn test_fetch_release_by_tag() {
        let mut mock = MockBackend::new();
        mock.add_release("o/tool", release("v1.0.0", false));

        assert_eq!(mock.fetch_release("o/tool", "v1.0.0").unwrap().tag, "v1.0.0");
        assert!(mock.fetch_release("o/tool", "v9").is_err());
    }

    #[test]
    fn test_download_records_and_returns_bytes() {
        let mut mock = MockBackend::new();
        let rel = release("v1.0.0", false);
        mock.add_asset("tool-v1.0.0.tar.gz", vec![1, 2, 3, 4]);

        let data = mock.download(&rel.assets[0]).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);
        assert_eq!(mock.downloads(), vec!["tool-v1.0.0.tar.gz"]);
    }

    #[test]
    fn test_download_not_configured() {
        let mock = MockBackend::new();
        let rel = release("v1.0.0", false);
        assert!(!mock.download(&rel.assets[0]).unwrap_err().is_retryable());
    }
}
