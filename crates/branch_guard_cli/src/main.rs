use clap::{Parser, Subcommand};
use tracing::{error, instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use branch_guard_cli::commands::{check_cmd, event_cmd, validate_cmd};
use branch_guard_cli::config::{get_config_path, AppConfig};
use branch_guard_cli::errors::Error;

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// BranchGuard CLI: Evaluate and maintain branch and tag protection rules
#[derive(Parser, Debug)]
#[command(name = "branch-guard")]
#[command(about = "Evaluate and maintain branch and tag protection rules", long_about = None)]
struct Cli {
    /// Path to the rule file (defaults to ./branch-guard.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the rule file for malformed patterns and expressions
    Validate,

    /// Show the forced push, deletion and reviewer policy of a branch
    Branch {
        /// Branch name
        name: String,
    },

    /// Show the reviewers required for a file changed on a branch
    File {
        /// Branch name
        branch: String,

        /// Path of the changed file
        path: String,
    },

    /// Show whether a user may create a tag
    Tag {
        /// Tag name
        name: String,

        /// Account creating the tag
        #[arg(short, long)]
        user: String,
    },

    /// Apply an identity event (JSON, or @file) to the rule file
    Event {
        /// Event such as {"kind":"team_deleted","name":"core"}
        event: String,

        /// Rewrite the rule file instead of printing the migrated rules
        #[arg(short, long)]
        write: bool,
    },

    /// List branch rules left without a target by a branch deletion
    DeletedBranch {
        /// Deleted branch name
        name: String,
    },

    /// Show the CLI version
    Version,
}

#[instrument]
fn run(cli: &Cli) -> Result<String, Error> {
    let config_path = get_config_path(cli.config.as_deref());

    match &cli.command {
        Commands::Validate => validate_cmd::validate_rules(&config_path),
        Commands::Branch { name } => check_cmd::check_branch(&AppConfig::load(&config_path)?, name),
        Commands::File { branch, path } => {
            check_cmd::check_file(&AppConfig::load(&config_path)?, branch, path)
        }
        Commands::Tag { name, user } => {
            check_cmd::check_tag(&AppConfig::load(&config_path)?, name, user)
        }
        Commands::Event { event, write } => event_cmd::execute(&config_path, event, *write),
        Commands::DeletedBranch { name } => {
            check_cmd::check_deleted_branch(&AppConfig::load(&config_path)?, name)
        }
        Commands::Version => Ok(format!(
            "branch-guard version {}",
            option_env!("BRANCH_GUARD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
        )),
    }
}

fn main() {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_env("BRANCH_GUARD_LOG"))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Error: {e}");
            std::process::exit(1);
        }
    }
}
