//! `primer apply` - converge the host

use anyhow::{Context as _, Result};
use colored::Colorize;
use converge::{ExecuteError, ExecuteOptions, KeepAlive, NoKeepAlive, RunReport};
use std::process::ExitCode;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::PrimerConfig;
use crate::host::SystemHost;
use crate::progress::ConsoleProgress;
use crate::state::LastRun;
use crate::sudo::SudoKeepAlive;
use crate::{signals, ui};

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<ExitCode> {
    ui::header("primer apply");
    super::ensure_not_under_sudo()?;

    let config = PrimerConfig::load()?;
    let default = config.operator.default_account();
    let account = match args.account.as_deref() {
        Some(given) => super::resolve_account(Some(given), &default)?,
        None if !args.yes && super::interactive() => super::prompt_account(&default)?,
        None => super::resolve_account(None, &default)?,
    };

    let steps = super::load_plan(&config, &account, &args.filter)?;
    if steps.is_empty() {
        ui::warn("No steps selected");
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    ui::kv("Account", &account);
    ui::kv("User", &config.operator.user());
    if args.dry_run {
        ui::kv("Mode", &"dry run (nothing is applied)".yellow().to_string());
    }
    println!();

    if !args.yes && !args.dry_run && super::interactive() {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Apply {} steps to this host?", steps.len()))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Nothing applied");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let host = SystemHost::new();
    let mut keep_alive: Box<dyn KeepAlive> = if args.dry_run || !host.needs_sudo() {
        Box::new(NoKeepAlive)
    } else {
        let grant = SudoKeepAlive::new("installing packages and editing system configuration");
        signals::install(grant.held()).context("Failed to install signal handlers")?;
        Box::new(grant)
    };

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
    };
    let mut progress = ConsoleProgress::new(ctx.quiet);

    let outcome = converge::execute(&steps, &host, keep_alive.as_mut(), &opts, &mut progress);
    drop(keep_alive);

    let report = match outcome {
        Ok(report) => report,
        Err(ExecuteError::Aborted(abort)) => {
            eprintln!("{} {abort}", "Error:".red().bold());
            *abort.report
        }
        Err(err @ ExecuteError::KeepAlive(_)) => return Err(err.into()),
    };

    let code = report.exit_code();
    record(&account, args.dry_run, report);
    Ok(ExitCode::from(code))
}

/// Persist the report; a failure here never changes the run's outcome
fn record(account: &str, dry_run: bool, report: RunReport) {
    let run = LastRun::new(account, dry_run, report);
    if let Err(e) = LastRun::path().and_then(|path| run.save_to(&path)) {
        ui::warn(&format!("Could not save run report: {e:#}"));
    }
}
