use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::cli::FilterArgs;
use crate::config::PrimerConfig;
use crate::ui;

pub fn run(_ctx: &Context) -> Result<()> {
    let config = PrimerConfig::load()?;
    let account = config.operator.default_account();
    let steps = super::load_plan(&config, &account, &FilterArgs::default())?;

    ui::header("Steps");
    println!();

    for (index, step) in steps.iter().enumerate() {
        let critical = if step.critical() {
            " critical".red().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:>2}. {:<36} {}{}",
            index + 1,
            step.name().bold(),
            step.kind().dimmed(),
            critical
        );
        ui::dim(&format!("      {}", step.description()));
    }

    println!();
    ui::section("Usage Examples");
    println!();
    println!("  {} Run every step", "primer apply".bold());
    println!(
        "  {} Skip specific steps",
        "primer apply --skip=install-docker,docker-group".bold()
    );
    println!(
        "  {} Run only specific steps",
        "primer apply --only=authorized-keys,harden-sshd".bold()
    );
    println!("  {} Preview without changes", "primer apply --dry-run".bold());
    Ok(())
}
