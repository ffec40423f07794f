//! Building the ordered step list from configuration
//!
//! The order is fixed: packages the rest depends on come first, SSH hardening
//! comes last so a failure earlier in the run never locks the operator out.

use anyhow::{Result, bail};
use converge::{BoxedStep, Step, StepList};
use releases::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PrimerConfig;
use crate::paths;
use crate::steps::{
    AptPackages, AptRepository, AuthorizedKeys, Fetch, GitClone, GitConfig, GroupMembership,
    LineInFile, LoginShell, ReleaseBinary, SshdHardening, authorized_keys_path,
};

/// Who and where a plan is built for
pub struct Target {
    /// GitHub account whose keys are authorized
    pub account: String,
    /// Local user whose shell and groups change
    pub user: String,
    /// Home directory of the local user
    pub home: PathBuf,
    pub fetch: Arc<dyn Fetch>,
    pub client: Arc<Client>,
}

/// Steps that abort the run on failure unless overridden in `[critical]`
const CRITICAL_BY_DEFAULT: &[&str] = &["base-packages"];

/// Build the full step list
pub fn build(config: &PrimerConfig, target: &Target) -> Result<StepList> {
    let mut steps = StepList::new();
    let mut add = |step: BoxedStep| -> Result<()> {
        steps.push(step)?;
        Ok(())
    };
    let critical = |name: &str| config.is_critical(name, CRITICAL_BY_DEFAULT.contains(&name));
    let home = |path: &str| expand_home(path, &target.home);

    if config.packages.enabled {
        add(Box::new(
            AptPackages::new("base-packages", config.packages.base.clone())
                .critical(critical("base-packages")),
        ))?;
    }

    let rc_file = home(&config.shell.rc_file);
    let mut rc_lines = Vec::new();

    if config.shell.enabled {
        let shell = &config.shell;
        add(Box::new(
            AptPackages::new("install-zsh", vec![shell.package.clone()])
                .critical(critical("install-zsh")),
        ))?;
        add(Box::new(
            LoginShell::new("login-shell", &target.user, &shell.zsh_path)
                .critical(critical("login-shell")),
        ))?;

        let plugins_dir = home(&shell.plugins_dir);
        for plugin in &shell.plugins {
            let name = format!("zsh-plugin-{}", plugin.name);
            let dest = plugins_dir.join(&plugin.name);
            rc_lines.push(format!(
                "source {}",
                dest.join(plugin.source_file()).display()
            ));
            add(Box::new(
                GitClone::new(&name, &plugin.url, dest).critical(critical(&name)),
            ))?;
        }
        rc_lines.extend(shell.rc_lines.iter().cloned());
    }

    if config.prompt.enabled {
        let name = format!("install-{}", config.prompt.release.binary);
        add(Box::new(
            ReleaseBinary::new(
                &name,
                config.prompt.release.clone(),
                config.bin_dir(),
                Arc::clone(&target.client),
            )
            .critical(critical(&name)),
        ))?;
        if config.shell.enabled {
            rc_lines.push(config.prompt.init_line.clone());
        }
    }

    if !rc_lines.is_empty() {
        add(Box::new(
            LineInFile::new("configure-zshrc", rc_file, rc_lines)
                .critical(critical("configure-zshrc")),
        ))?;
    }

    if config.editor.enabled {
        add(Box::new(
            AptPackages::new("install-editor", config.editor.packages.clone())
                .critical(critical("install-editor")),
        ))?;
        add(Box::new(
            GitConfig::new(
                "configure-git-editor",
                vec![("core.editor".into(), config.editor.git_editor.clone())],
            )
            .critical(critical("configure-git-editor")),
        ))?;
    }

    if config.diff.enabled {
        let binary = &config.diff.release.binary;
        let install = format!("install-{binary}");
        add(Box::new(
            ReleaseBinary::new(
                &install,
                config.diff.release.clone(),
                config.bin_dir(),
                Arc::clone(&target.client),
            )
            .critical(critical(&install)),
        ))?;

        let configure = format!("configure-git-{binary}");
        let settings = config
            .diff
            .git_config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        add(Box::new(
            GitConfig::new(&configure, settings).critical(critical(&configure)),
        ))?;
    }

    if config.docker.enabled {
        let docker = &config.docker;
        add(Box::new(
            AptRepository::new(
                "docker-repository",
                &docker.repo_url,
                &docker.key_url,
                Arc::clone(&target.fetch),
            )
            .keyring(&docker.keyring)
            .sources(&docker.sources_file)
            .suite(docker.suite.clone())
            .components(&docker.components)
            .critical(critical("docker-repository")),
        ))?;
        add(Box::new(
            AptPackages::new("install-docker", docker.packages.clone())
                .critical(critical("install-docker")),
        ))?;
        add(Box::new(
            GroupMembership::new("docker-group", &target.user, &docker.group)
                .critical(critical("docker-group")),
        ))?;
    }

    if config.ssh.enabled {
        let ssh = &config.ssh;
        let keys = authorized_keys_path(&target.home);
        add(Box::new(
            AuthorizedKeys::new(
                "authorized-keys",
                &target.account,
                &ssh.keys_url,
                target.home.join(".ssh"),
                Arc::clone(&target.fetch),
            )
            .critical(critical("authorized-keys")),
        ))?;
        add(Box::new(
            SshdHardening::new("harden-sshd", &ssh.dropin, ssh.settings.clone(), keys)
                .service(&ssh.service)
                .critical(critical("harden-sshd")),
        ))?;
    }

    for name in config.critical.keys() {
        if !steps.contains(name) {
            log::warn!("[critical] names unknown step '{name}'");
        }
    }

    Ok(steps)
}

/// Keep only the `only` steps (all when empty), then drop the `skip` steps
///
/// Order is preserved. Unknown names are an error so a typo never silently
/// runs everything.
pub fn filter(steps: &mut StepList, only: &[String], skip: &[String]) -> Result<()> {
    let unknown: Vec<&str> = only
        .iter()
        .chain(skip)
        .map(String::as_str)
        .filter(|name| !steps.contains(name))
        .collect();
    if !unknown.is_empty() {
        bail!(
            "unknown step(s): {} (run `primer steps` to list them)",
            unknown.join(", ")
        );
    }

    steps.retain(|step: &dyn Step| {
        let name = step.name().to_string();
        (only.is_empty() || only.contains(&name)) && !skip.contains(&name)
    });
    Ok(())
}

/// Expand `~` against the target's home, anything else through the shell rules
fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => paths::expand(path),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::StaticFetch;
    use releases::{MockBackend, RetryConfig};

    fn target() -> Target {
        Target {
            account: "octocat".into(),
            user: "dev".into(),
            home: PathBuf::from("/home/dev"),
            fetch: Arc::new(StaticFetch::new()),
            client: Arc::new(
                Client::with_backend(Box::new(MockBackend::new())).retry(RetryConfig::no_retry()),
            ),
        }
    }

    fn names(steps: &StepList) -> Vec<String> {
        steps.names().into_iter().map(String::from).collect()
    }

    #[test]
    fn test_default_order() {
        let steps = build(&PrimerConfig::default(), &target()).unwrap();
        assert_eq!(
            names(&steps),
            vec![
                "base-packages",
                "install-zsh",
                "login-shell",
                "zsh-plugin-zsh-autosuggestions",
                "zsh-plugin-zsh-syntax-highlighting",
                "install-starship",
                "configure-zshrc",
                "install-editor",
                "configure-git-editor",
                "install-delta",
                "configure-git-delta",
                "docker-repository",
                "install-docker",
                "docker-group",
                "authorized-keys",
                "harden-sshd",
            ]
        );
    }

    #[test]
    fn test_only_base_packages_critical() {
        let steps = build(&PrimerConfig::default(), &target()).unwrap();
        let critical: Vec<&str> = steps
            .iter()
            .filter(|s| s.critical())
            .map(|s| s.name())
            .collect();
        assert_eq!(critical, vec!["base-packages"]);
    }

    #[test]
    fn test_critical_overrides() {
        let mut config = PrimerConfig::default();
        config.critical.insert("base-packages".into(), false);
        config.critical.insert("install-docker".into(), true);

        let steps = build(&config, &target()).unwrap();
        let critical: Vec<&str> = steps
            .iter()
            .filter(|s| s.critical())
            .map(|s| s.name())
            .collect();
        assert_eq!(critical, vec!["install-docker"]);
    }

    #[test]
    fn test_disabled_sections() {
        let mut config = PrimerConfig::default();
        config.docker.enabled = false;
        config.ssh.enabled = false;
        config.shell.enabled = false;

        let steps = build(&config, &target()).unwrap();
        assert_eq!(
            names(&steps),
            vec![
                "base-packages",
                "install-starship",
                "install-editor",
                "configure-git-editor",
                "install-delta",
                "configure-git-delta",
            ]
        );
    }

    #[test]
    fn test_descriptions_use_target_home() {
        let steps = build(&PrimerConfig::default(), &target()).unwrap();
        let zshrc = steps.iter().find(|s| s.name() == "configure-zshrc").unwrap();
        assert_eq!(zshrc.description(), "Ensure 7 line(s) in /home/dev/.zshrc");

        let keys = steps.iter().find(|s| s.name() == "authorized-keys").unwrap();
        assert!(keys.description().contains("https://github.com/octocat.keys"));
    }

    #[test]
    fn test_filter_only_preserves_order() {
        let mut steps = build(&PrimerConfig::default(), &target()).unwrap();
        filter(
            &mut steps,
            &["harden-sshd".into(), "base-packages".into()],
            &[],
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["base-packages", "harden-sshd"]);
    }

    #[test]
    fn test_filter_skip() {
        let mut steps = build(&PrimerConfig::default(), &target()).unwrap();
        let before = steps.len();
        filter(&mut steps, &[], &["install-docker".into(), "docker-group".into()]).unwrap();
        assert_eq!(steps.len(), before - 2);
        assert!(!steps.contains("install-docker"));
        assert!(steps.contains("docker-repository"));
    }

    #[test]
    fn test_filter_rejects_unknown_names() {
        let mut steps = build(&PrimerConfig::default(), &target()).unwrap();
        let err = filter(&mut steps, &["install-dokcer".into()], &[]).unwrap_err();
        assert!(err.to_string().contains("install-dokcer"));
        assert_eq!(steps.len(), 16);
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/dev");
        assert_eq!(expand_home("~", home), PathBuf::from("/home/dev"));
        assert_eq!(
            expand_home("~/.zshrc", home),
            PathBuf::from("/home/dev/.zshrc")
        );
        assert_eq!(
            expand_home("/etc/zsh/zshrc", home),
            PathBuf::from("/etc/zsh/zshrc")
        );
    }
}
