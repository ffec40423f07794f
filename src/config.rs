//! primer configuration (`config.toml`)
//!
//! Every section has built-in defaults, so an empty or missing file yields a
//! complete plan. Sections can be switched off with `enabled = false`.

use anyhow::{Context, Result, bail};
use releases::ReleaseSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::paths;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Account used when nothing else names one
pub const FALLBACK_ACCOUNT: &str = "ubuntu";

// ============================================================================
// Main Config Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimerConfig {
    /// Where release binaries are installed
    pub bin_dir: String,

    /// Per-step overrides of the `critical` flag, keyed by step name
    pub critical: BTreeMap<String, bool>,

    pub operator: OperatorConfig,
    pub packages: PackagesConfig,
    pub shell: ShellConfig,
    pub prompt: PromptConfig,
    pub editor: EditorConfig,
    pub diff: DiffConfig,
    pub docker: DockerConfig,
    pub ssh: SshConfig,
}

impl Default for PrimerConfig {
    fn default() -> Self {
        Self {
            bin_dir: "/usr/local/bin".into(),
            critical: BTreeMap::new(),
            operator: OperatorConfig::default(),
            packages: PackagesConfig::default(),
            shell: ShellConfig::default(),
            prompt: PromptConfig::default(),
            editor: EditorConfig::default(),
            diff: DiffConfig::default(),
            docker: DockerConfig::default(),
            ssh: SshConfig::default(),
        }
    }
}

impl PrimerConfig {
    /// Path of the config file
    pub fn path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join(CONFIG_FILE))
    }

    /// Load the config from the config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load a config file; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "No config at {}, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for plugin in &self.shell.plugins {
            if plugin.name.trim().is_empty() {
                bail!("shell plugin with url '{}' has no name", plugin.url);
            }
            if !seen.insert(plugin.name.as_str()) {
                bail!("shell plugin '{}' is listed twice", plugin.name);
            }
        }

        if !self.ssh.keys_url.contains("{account}") {
            bail!("ssh.keys_url must contain {{account}}");
        }

        if let Some(account) = &self.operator.default_account {
            crate::commands::validate_account(account)?;
        }

        Ok(())
    }

    /// Release binary directory with `~` expanded
    pub fn bin_dir(&self) -> PathBuf {
        paths::expand(&self.bin_dir)
    }

    /// Critical flag for a step, after overrides
    pub fn is_critical(&self, step: &str, default: bool) -> bool {
        self.critical.get(step).copied().unwrap_or(default)
    }
}

// ============================================================================
// Operator
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// GitHub account whose public keys are authorized
    pub default_account: Option<String>,

    /// Local user whose shell and groups are managed
    pub user: Option<String>,
}

impl OperatorConfig {
    /// Account used when none is given: config, then the invoking login
    pub fn default_account(&self) -> String {
        pick(self.default_account.as_deref(), invoking_login())
    }

    /// Local user: config, then the invoking login (`$SUDO_USER` before `$USER`)
    pub fn user(&self) -> String {
        pick(self.user.as_deref(), invoking_login())
    }
}

fn invoking_login() -> Option<String> {
    login_name(std::env::var("SUDO_USER").ok(), std::env::var("USER").ok())
}

fn pick(configured: Option<&str>, login: Option<String>) -> String {
    configured
        .map(str::to_string)
        .or(login)
        .unwrap_or_else(|| FALLBACK_ACCOUNT.to_string())
}

/// First non-empty, non-root login name
fn login_name(sudo_user: Option<String>, user: Option<String>) -> Option<String> {
    [sudo_user, user]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty() && name != "root")
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub enabled: bool,
    /// Installed first; the run aborts if this fails
    pub base: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base: strings(&[
                "build-essential",
                "ca-certificates",
                "curl",
                "git",
                "gnupg",
                "unzip",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZshPlugin {
    pub name: String,
    pub url: String,
    /// Script sourced from the rc file, relative to the clone
    #[serde(default)]
    pub source: Option<String>,
}

impl ZshPlugin {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            source: None,
        }
    }

    pub fn source_file(&self) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| format!("{}.zsh", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub enabled: bool,
    pub package: String,
    pub zsh_path: String,
    pub plugins_dir: String,
    pub plugins: Vec<ZshPlugin>,
    pub rc_file: String,
    /// Extra lines for the rc file, after the plugin `source` lines
    pub rc_lines: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            package: "zsh".into(),
            zsh_path: "/usr/bin/zsh".into(),
            plugins_dir: "~/.zsh/plugins".into(),
            plugins: vec![
                ZshPlugin::new(
                    "zsh-autosuggestions",
                    "https://github.com/zsh-users/zsh-autosuggestions",
                ),
                ZshPlugin::new(
                    "zsh-syntax-highlighting",
                    "https://github.com/zsh-users/zsh-syntax-highlighting",
                ),
            ],
            rc_file: "~/.zshrc".into(),
            rc_lines: strings(&[
                "HISTFILE=~/.zsh_history",
                "HISTSIZE=10000",
                "SAVEHIST=10000",
                "setopt share_history",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub enabled: bool,
    pub release: ReleaseSpec,
    /// Appended to the shell rc file
    pub init_line: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            release: ReleaseSpec {
                repo: "starship/starship".into(),
                tag: None,
                asset: "starship-{triple}.tar.gz".into(),
                binary: "starship".into(),
            },
            init_line: "eval \"$(starship init zsh)\"".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub enabled: bool,
    pub packages: Vec<String>,
    /// Value for `core.editor`
    pub git_editor: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            packages: strings(&["neovim"]),
            git_editor: "nvim".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub enabled: bool,
    pub release: ReleaseSpec,
    /// Global git settings that route diffs and merges through the tool
    pub git_config: BTreeMap<String, String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            release: ReleaseSpec {
                repo: "dandavison/delta".into(),
                tag: None,
                asset: "delta-{version}-{triple}.tar.gz".into(),
                binary: "delta".into(),
            },
            git_config: [
                ("core.pager", "delta"),
                ("delta.navigate", "true"),
                ("interactive.diffFilter", "delta --color-only"),
                ("merge.conflictStyle", "zdiff3"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub enabled: bool,
    pub key_url: String,
    pub keyring: String,
    pub repo_url: String,
    pub sources_file: String,
    /// Release codename; detected from `/etc/os-release` when unset
    pub suite: Option<String>,
    pub components: String,
    pub packages: Vec<String>,
    /// Group the local user joins to use docker without sudo
    pub group: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_url: "https://download.docker.com/linux/ubuntu/gpg".into(),
            keyring: "/etc/apt/keyrings/docker.gpg".into(),
            repo_url: "https://download.docker.com/linux/ubuntu".into(),
            sources_file: "/etc/apt/sources.list.d/docker.list".into(),
            suite: None,
            components: "stable".into(),
            packages: strings(&[
                "docker-ce",
                "docker-ce-cli",
                "containerd.io",
                "docker-buildx-plugin",
                "docker-compose-plugin",
            ]),
            group: "docker".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub enabled: bool,
    /// Public keys of the operator account; `{account}` is substituted
    pub keys_url: String,
    /// sshd drop-in; sorts before cloud-init's so its settings win
    pub dropin: String,
    pub settings: Vec<String>,
    pub service: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keys_url: "https://github.com/{account}.keys".into(),
            dropin: "/etc/ssh/sshd_config.d/10-primer-hardening.conf".into(),
            settings: strings(&[
                "PasswordAuthentication no",
                "KbdInteractiveAuthentication no",
                "PermitRootLogin prohibit-password",
            ]),
            service: "ssh".into(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

// ============================================================================
// Tests
// ============================================================================
