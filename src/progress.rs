//! Console rendering of a provisioning pass
//!
//! A spinner runs while a step is being detected or applied; once the outcome
//! is known the spinner is cleared and a permanent line is printed.

use colored::Colorize;
use converge::{ProgressCallback, RunReport, StepResult, StepStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

/// Printed under a failed critical step
pub const REMEDIATION_HINT: &str = "fix the problem above and re-run `primer apply`";

/// Outcome marker: `○` skipped, `✓` applied, `⚠` failed, `✗` failed critical
pub fn marker(result: &StepResult) -> &'static str {
    match result.status {
        StepStatus::Failed if !result.critical => "⚠",
        status => status.symbol(),
    }
}

/// Print the permanent line for one step outcome
pub fn print_result(result: &StepResult) {
    let symbol = marker(result);
    let duration = format!("({})", ui::format_duration(result.duration_ms));

    match result.status {
        StepStatus::Skipped => {
            println!(
                "  {} {:<36} {}",
                symbol.dimmed(),
                result.name,
                result.detail.dimmed()
            );
        }
        StepStatus::Applied => {
            println!(
                "  {} {:<36} {} {}",
                symbol.green(),
                result.name,
                result.detail,
                duration.dimmed()
            );
        }
        StepStatus::Failed if result.critical => {
            println!("  {} {} {}", symbol.red().bold(), result.name.bold(), "(critical)".red());
            println!("{}", ui::indent(&result.detail, "      ").red());
            println!("      {}", REMEDIATION_HINT.yellow());
        }
        StepStatus::Failed => {
            println!("  {} {}", symbol.yellow(), result.name);
            println!("{}", ui::indent(&result.detail, "      ").dimmed());
        }
    }
}

/// Print the closing summary of a run
pub fn print_summary(report: &RunReport) {
    println!();
    if report.aborted {
        println!("  {} Provisioning aborted", "✗".red().bold());
    } else if report.is_success() {
        println!("  {} Host converged successfully!", "✓".green().bold());
    } else {
        println!("  {} Host converged with errors", "⚠".yellow().bold());
    }

    if report.applied() > 0 {
        println!("    • {} steps applied", report.applied());
    }
    if report.skipped() > 0 {
        println!("    • {} steps already satisfied", report.skipped());
    }
    if report.failed() > 0 {
        println!("    • {} {} failed", report.failed(), "steps".red());
    }
}

/// [`ProgressCallback`] drawing to the terminal
pub struct ConsoleProgress {
    spinner: Option<ProgressBar>,
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            spinner: None,
            quiet,
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_run_start(&mut self, total: usize) {
        if !self.quiet {
            println!("  {} steps", total.to_string().bold());
            println!();
        }
    }

    fn on_step_start(&mut self, index: usize, total: usize, name: &str, description: &str) {
        self.clear_spinner();
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {prefix:.blue.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_prefix(format!("[{index}/{total}]"));
        pb.set_message(format!("{name} - {description}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn on_step_complete(&mut self, result: &StepResult) {
        self.clear_spinner();
        // Failures are always shown, even with --quiet
        if !self.quiet || result.is_failed() {
            print_result(result);
        }
    }

    fn on_run_complete(&mut self, report: &RunReport) {
        self.clear_spinner();
        print_summary(report);
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: StepStatus, critical: bool) -> StepResult {
        StepResult {
            name: "install-docker".into(),
            status,
            detail: String::new(),
            critical,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_markers() {
        assert_eq!(marker(&result(StepStatus::Skipped, false)), "○");
        assert_eq!(marker(&result(StepStatus::Applied, true)), "✓");
        assert_eq!(marker(&result(StepStatus::Failed, false)), "⚠");
        assert_eq!(marker(&result(StepStatus::Failed, true)), "✗");
    }
}
