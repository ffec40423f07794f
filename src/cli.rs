use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "primer")]
#[command(version)]
#[command(about = "Provision an Ubuntu host: shell, Docker, prompt, editor, diff tools and SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the host: detect every step, apply what is missing
    Apply(ApplyArgs),

    /// Show which steps are satisfied, without changing anything
    Status(StatusArgs),

    /// List the steps in execution order
    Steps,

    /// Show the report of the last apply
    Report,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// GitHub account whose public SSH keys are authorized
    #[arg(short, long, env = "PRIMER_ACCOUNT")]
    pub account: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Detect only - show what would be applied
    #[arg(long)]
    pub dry_run: bool,

    /// Don't prompt for the account or confirmation
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Status
// ============================================================================

#[derive(Parser)]
pub struct StatusArgs {
    /// GitHub account whose public SSH keys are checked
    #[arg(short, long, env = "PRIMER_ACCOUNT")]
    pub account: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Parser, Default)]
pub struct FilterArgs {
    /// Only run specific steps (comma-separated)
    #[arg(long)]
    pub only: Option<String>,

    /// Skip specific steps (comma-separated)
    #[arg(long)]
    pub skip: Option<String>,
}

impl FilterArgs {
    pub fn only(&self) -> Vec<String> {
        split_names(self.only.as_deref())
    }

    pub fn skip(&self) -> Vec<String> {
        split_names(self.skip.as_deref())
    }
}

fn split_names(list: Option<&str>) -> Vec<String> {
    list.map(|l| {
        l.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
