//! GitHub releases backend.
//!
//! Unauthenticated API requests are limited to 60 per hour per address,
//! which is plenty for one provisioning pass.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Release, ReleaseAsset};
use serde::Deserialize;

/// Maximum download size (100 MB covers any single-binary tool).
const MAX_BODY_SIZE: u64 = 100 * 1024 * 1024;

const USER_AGENT: &str = concat!("primer/", env!("CARGO_PKG_VERSION"));

/// GitHub releases backend.
///
/// ```no_run
/// use releases::backend::github::GitHubBackend;
/// use releases::backend::Backend;
///
/// let backend = GitHubBackend::new();
/// let latest = backend.fetch_latest("starship/starship").unwrap();
/// println!("starship {}", latest.tag);
/// ```
pub struct GitHubBackend {
    agent: ureq::Agent,
    api_base: String,
}

impl GitHubBackend {
    /// Create a new GitHub backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base("https://api.github.com")
    }

    /// Create a backend with a custom API base (mirrors, GitHub Enterprise).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn latest_url(&self, repo: &str) -> String {
        format!("{}/repos/{repo}/releases/latest", self.api_base)
    }

    fn release_url(&self, repo: &str, tag: &str) -> String {
        format!("{}/repos/{repo}/releases/tags/{tag}", self.api_base)
    }

    fn get_release(&self, url: &str, repo: &str, tag: &str) -> Result<Release> {
        log::debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .call();

        let mut response = match response {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(Error::ReleaseNotFound {
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let release: GitHubRelease = response.body_mut().read_json()?;
        Ok(release.into())
    }
}

impl Default for GitHubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for GitHubBackend {
    fn fetch_latest(&self, repo: &str) -> Result<Release> {
        self.get_release(&self.latest_url(repo), repo, "latest")
    }

    fn fetch_release(&self, repo: &str, tag: &str) -> Result<Release> {
        self.get_release(&self.release_url(repo, tag), repo, tag)
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        log::debug!("downloading {} ({} bytes)", asset.download_url, asset.size);
        let mut response = self
            .agent
            .get(&asset.download_url)
            .header("Accept", "application/octet-stream")
            .header("User-Agent", USER_AGENT)
            .call()?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(Error::from)
    }
}

// =============================================================================
// GitHub API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    name: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    size: u64,
}

impl From<GitHubRelease> for Release {
    fn from(r: GitHubRelease) -> Self {
        Self {
            name: r.name.filter(|n| !n.is_empty()).unwrap_or_else(|| r.tag_name.clone()),
            tag: r.tag_name,
            prerelease: r.prerelease,
            assets: r.assets.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<GitHubAsset> for ReleaseAsset {
    fn from(a: GitHubAsset) -> Self {
        Self {
            name: a.name,
            download_url: a.browser_download_url,
            size: a.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let backend = GitHubBackend::new();
        assert_eq!(
            backend.latest_url("starship/starship"),
            "https://api.github.com/repos/starship/starship/releases/latest"
        );
        assert_eq!(
            backend.release_url("dandavison/delta", "0.18.2"),
            "https://api.github.com/repos/dandavison/delta/releases/tags/0.18.2"
        );
    }

    #[test]
    fn test_custom_api_base() {
        let backend = GitHubBackend::with_api_base("https://ghe.internal/api/v3");
        assert_eq!(backend.api_base(), "https://ghe.internal/api/v3");
        assert_eq!(GitHubBackend::default().api_base(), "https://api.github.com");
    }

    #[test]
    fn test_release_json_conversion() {
        let json = r#"{
            "tag_name": "v1.20.1",
            "name": "",
            "prerelease": false,
            "assets": [{
                "name": "starship-x86_64-unknown-linux-gnu.tar.gz",
                "browser_download_url": "https://example.com/starship.tar.gz",
                "size": 4096,
                "content_type": "application/gzip"
            }]
        }"#;

        let release: Release = serde_json::from_str::<GitHubRelease>(json).unwrap().into();
        assert_eq!(release.tag, "v1.20.1");
        assert_eq!(release.name, "v1.20.1");
        assert_eq!(release.assets[0].download_url, "https://example.com/starship.tar.gz");
        assert_eq!(release.assets[0].size, 4096);
    }
}
