use anyhow::Result;
use colored::Colorize;
use converge::{Detection, SurveyEntry};

use crate::Context;
use crate::cli::StatusArgs;
use crate::config::PrimerConfig;
use crate::host::SystemHost;
use crate::ui;

pub fn run(_ctx: &Context, args: StatusArgs) -> Result<()> {
    ui::header("Host Status");

    let config = PrimerConfig::load()?;
    let account =
        super::resolve_account(args.account.as_deref(), &config.operator.default_account())?;
    let steps = super::load_plan(&config, &account, &args.filter)?;

    println!();
    let entries = converge::survey(&steps, &SystemHost::new());
    for entry in &entries {
        print_entry(entry);
    }

    let satisfied = entries
        .iter()
        .filter(|e| matches!(e.detection, Ok(Detection::AlreadySatisfied)))
        .count();
    let pending = entries.len() - satisfied;

    println!();
    if pending == 0 {
        ui::success("Host is converged");
    } else {
        ui::info(&format!(
            "{} of {} steps pending. Run: {}",
            pending,
            entries.len(),
            "primer apply".bold()
        ));
    }
    Ok(())
}

fn print_entry(entry: &SurveyEntry) {
    match &entry.detection {
        Ok(Detection::AlreadySatisfied) => {
            println!("  {} {:<36} {}", "✓".green(), entry.name, entry.description.dimmed());
        }
        Ok(Detection::NeedsApply) => {
            println!("  {} {:<36} {}", "○".yellow(), entry.name, entry.description);
        }
        Err(e) => {
            println!("  {} {:<36} {}", "⚠".yellow(), entry.name, e.dimmed());
        }
    }
}
