use anyhow::Result;
use chrono::Local;
use colored::Colorize;

use crate::Context;
use crate::progress;
use crate::state::LastRun;
use crate::ui;

pub fn run(_ctx: &Context) -> Result<()> {
    let path = LastRun::path()?;
    let Some(run) = LastRun::load_from(&path)? else {
        ui::info("No apply recorded yet");
        ui::dim(&format!("Run: {}", "primer apply".bold()));
        return Ok(());
    };

    ui::header("Last Run");
    ui::kv(
        "Finished",
        &run.finished_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    );
    ui::kv("Account", &run.account);
    if run.dry_run {
        ui::kv("Mode", &"dry run".yellow().to_string());
    }
    ui::kv("Report", &path.display().to_string());
    println!();

    for result in &run.report.results {
        progress::print_result(result);
    }
    progress::print_summary(&run.report);
    Ok(())
}
