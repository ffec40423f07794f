//! Subcommands and the plumbing they share

pub mod apply;
pub mod report;
pub mod status;
pub mod steps;

use anyhow::{Context as _, Result, bail};
use converge::StepList;
use regex::Regex;
use releases::Client;
use std::sync::Arc;

use crate::cli::FilterArgs;
use crate::config::PrimerConfig;
use crate::paths;
use crate::plan::{self, Target};
use crate::steps::HttpFetch;

/// GitHub login: alphanumerics and single inner hyphens, at most 39 chars
const ACCOUNT_PATTERN: &str = r"^[A-Za-z0-9](?:-?[A-Za-z0-9]){0,38}$";

/// Check an account name before it ends up in a URL
pub fn validate_account(account: &str) -> Result<()> {
    if !Regex::new(ACCOUNT_PATTERN)?.is_match(account) {
        bail!("'{account}' is not a valid GitHub account name");
    }
    Ok(())
}

/// Operator input, or the default when absent or blank
pub fn resolve_account(input: Option<&str>, default: &str) -> Result<String> {
    let account = match input.map(str::trim) {
        Some(given) if !given.is_empty() => given,
        _ => {
            log::info!("No account given, using default '{default}'");
            default.trim()
        }
    };
    validate_account(account)?;
    Ok(account.to_string())
}

/// Ask for the account on a terminal; blank accepts the default
pub fn prompt_account(default: &str) -> Result<String> {
    let input: String = dialoguer::Input::new()
        .with_prompt("GitHub account whose SSH keys to authorize")
        .default(default.to_string())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read account")?;
    resolve_account(Some(&input), default)
}

/// Whether prompts can be shown
pub fn interactive() -> bool {
    console::Term::stdout().is_term() && console::Term::stderr().is_term()
}

/// Login that ran primer through sudo, when running as root on its behalf
fn sudo_invoker(root: bool, sudo_user: Option<String>) -> Option<String> {
    sudo_user.filter(|user| root && !user.is_empty() && user != "root")
}

/// Refuse `sudo primer apply`: files in the user's home would end up owned by root
pub fn ensure_not_under_sudo() -> Result<()> {
    if let Some(user) = sudo_invoker(crate::host::is_root(), std::env::var("SUDO_USER").ok()) {
        bail!("run primer as {user} without sudo; it elevates individual commands itself");
    }
    Ok(())
}

/// Plan for the current user, filtered by `--only` / `--skip`
pub fn load_plan(config: &PrimerConfig, account: &str, filter: &FilterArgs) -> Result<StepList> {
    let user = config.operator.user();
    let target = Target {
        account: account.to_string(),
        home: paths::home_of(&user)?,
        user,
        fetch: Arc::new(HttpFetch::new()),
        client: Arc::new(Client::new()),
    };

    let mut steps = plan::build(config, &target)?;
    plan::filter(&mut steps, &filter.only(), &filter.skip())?;
    Ok(steps)
}
