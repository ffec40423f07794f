//! Core types for release fetching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target platform for binary downloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (e.g., "linux").
    pub os: String,
    /// CPU architecture as Rust names it (e.g., "x86_64", "aarch64").
    pub arch: String,
    /// Platform triple (e.g., "x86_64-unknown-linux-gnu").
    pub triple: String,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>, triple: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            triple: triple.into(),
        }
    }

    /// Architecture as Debian names it (`amd64`, `arm64`).
    #[must_use]
    pub fn deb_arch(&self) -> &str {
        match self.arch.as_str() {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "riscv64" => "riscv64",
            other => other,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.triple)
    }
}

/// A release available for download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Release tag (e.g., "v1.20.1").
    pub tag: String,
    /// Release name.
    pub name: String,
    /// Whether this is a prerelease.
    pub prerelease: bool,
    /// Available assets.
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Find an asset by exact name.
    #[must_use]
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Tag without a leading `v` (`v1.2.3` → `1.2.3`).
    #[must_use]
    pub fn version(&self) -> &str {
        self.tag.strip_prefix('v').unwrap_or(&self.tag)
    }
}

/// An asset within a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Asset name (e.g., "starship-x86_64-unknown-linux-gnu.tar.gz").
    pub name: String,
    /// Download URL.
    pub download_url: String,
    /// Size in bytes.
    pub size: u64,
}

impl ReleaseAsset {
    /// Check if this asset is a gzip-compressed tarball.
    #[must_use]
    pub fn is_tarball(&self) -> bool {
        self.name.ends_with(".tar.gz") || self.name.ends_with(".tgz")
    }
}

/// What to fetch: one binary out of one repository's releases.
///
/// `asset` is a template; these placeholders are substituted:
///
/// | Placeholder  | Example                     |
/// |--------------|-----------------------------|
/// | `{tag}`      | `v1.20.1`                   |
/// | `{version}`  | `1.20.1`                    |
/// | `{triple}`   | `x86_64-unknown-linux-gnu`  |
/// | `{arch}`     | `x86_64`                    |
/// | `{deb_arch}` | `amd64`                     |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    /// Repository in `owner/name` form.
    pub repo: String,
    /// Release tag, `None` for the latest release.
    #[serde(default)]
    pub tag: Option<String>,
    /// Asset name template.
    pub asset: String,
    /// Binary file name inside the asset.
    pub binary: String,
}

impl ReleaseSpec {
    /// Resolve the asset name for a concrete release and platform.
    #[must_use]
    pub fn asset_name(&self, release: &Release, platform: &Platform) -> String {
        self.asset
            .replace("{tag}", &release.tag)
            .replace("{version}", release.version())
            .replace("{triple}", &platform.triple)
            .replace("{deb_arch}", platform.deb_arch())
            .replace("{arch}", &platform.arch)
    }
}

/// A binary extracted from a release asset.
#[derive(Debug, Clone)]
pub struct FetchedBinary {
    /// Tag of the release it came from.
    pub tag: String,
    /// Asset it was extracted from.
    pub asset: String,
    /// Executable contents.
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str) -> Release {
        Release {
            tag: tag.to_string(),
            name: tag.to_string(),
            prerelease: false,
            assets: vec![],
        }
    }

    #[test]
    fn test_version_strips_leading_v() {
        assert_eq!(release("v1.20.1").version(), "1.20.1");
        assert_eq!(release("0.18.2").version(), "0.18.2");
    }

    #[test]
    fn test_asset_name_substitution() {
        let platform = Platform::new("linux", "x86_64", "x86_64-unknown-linux-gnu");

        let delta = ReleaseSpec {
            repo: "dandavison/delta".into(),
            tag: None,
            asset: "delta-{version}-{triple}.tar.gz".into(),
            binary: "delta".into(),
        };
        assert_eq!(
            delta.asset_name(&release("0.18.2"), &platform),
            "delta-0.18.2-x86_64-unknown-linux-gnu.tar.gz"
        );

        let deb = ReleaseSpec {
            asset: "tool_{tag}_{deb_arch}_{arch}.tar.gz".into(),
            ..delta
        };
        assert_eq!(
            deb.asset_name(&release("v2"), &platform),
            "tool_v2_amd64_x86_64.tar.gz"
        );
    }

    #[test]
    fn test_deb_arch() {
        let arm = Platform::new("linux", "aarch64", "aarch64-unknown-linux-gnu");
        assert_eq!(arm.deb_arch(), "arm64");
        assert_eq!(arm.to_string(), "aarch64-unknown-linux-gnu");
    }

    #[test]
    fn test_is_tarball() {
        let asset = ReleaseAsset {
            name: "starship-x86_64-unknown-linux-gnu.tar.gz".into(),
            download_url: String::new(),
            size: 0,
        };
        assert!(asset.is_tarball());
    }
}
