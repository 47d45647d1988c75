use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::sync::SyncOptions;
use crate::commands::{self, CommandReport};
use crate::ledger::paths::resolve_paths;
use crate::logging;

#[derive(Parser)]
#[command(
    name = "pick3-sync",
    about = "Merge the Pick 3 draw feed into the newest-first workbook table",
    version
)]
pub struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the feed, merge new draws into the table and run the extractors
    Sync {
        /// Read the feed payload from a file instead of the configured endpoint
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Do not run the downstream extractors after the merge
        #[arg(long)]
        skip_extractors: bool,
    },

    /// Create an empty workbook with the table header
    Init {
        /// Overwrite an existing workbook
        #[arg(long)]
        force: bool,
    },

    /// Show resolved paths, configuration and the current table
    Status,

    /// Commit and push the repository holding the generated files
    Publish {
        /// Commit message
        #[arg(long, short = 'm')]
        message: Option<String>,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn dispatch(command: &Commands) -> Result<CommandReport> {
    match command {
        Commands::Sync {
            payload,
            skip_extractors,
        } => commands::sync::run(&SyncOptions {
            payload: payload.clone(),
            skip_extractors: *skip_extractors,
        }),
        Commands::Init { force } => commands::init::run(*force),
        Commands::Status => commands::status::run(),
        Commands::Publish { message } => commands::publish::run(message.as_deref()),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Ok(paths) = resolve_paths() {
        logging::init(&paths.logs_dir);
    }

    let report = match dispatch(&cli.command) {
        Ok(report) => report,
        Err(err) => {
            logging::log(format!("FATAL ERROR: {err:#}"));
            return Err(err);
        }
    };

    print_report(&report, cli.json)?;
    if report.ok {
        Ok(())
    } else {
        Err(anyhow!("{} reported {} issue(s)", report.command, report.issues.len()))
    }
}
