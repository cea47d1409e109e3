pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use reorder_core::UserId;

#[derive(Debug, Parser)]
#[command(
    name = "reorder",
    about = "Reorder suggestion engine CLI",
    long_about = "Rank reorder suggestions and inspect item statistics over a JSON order history file.",
    after_help = "Examples:\n  reorder suggest --history orders.json --user <uuid>\n  reorder stats --history orders.json --user <uuid>\n  reorder config"
)]
pub struct Cli {
    /// Optional TOML config file (defaults to ./reorder.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Args)]
pub struct HistoryArgs {
    /// JSON file holding an array of order records.
    #[arg(long)]
    pub history: PathBuf,

    /// User whose history is analyzed; records of other users are dropped.
    #[arg(long)]
    pub user: UserId,

    /// Evaluation time (RFC 3339). Defaults to the current time.
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Rank a reorder suggestion and print it (or the no-suggestion reason) as JSON")]
    Suggest {
        #[command(flatten)]
        args: HistoryArgs,
    },
    #[command(about = "Print the per-item purchase statistics derived from the history")]
    Stats {
        #[command(flatten)]
        args: HistoryArgs,
    },
    #[command(about = "Print the effective configuration (defaults, file, REORDER_* env)")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> ExitCode {
    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error:#}");
            return ExitCode::from(2);
        }
    };
    reorder_observability::init_with(&config.logging);

    let result = match cli.command {
        Command::Suggest { args } => commands::suggest::run(&config, &args),
        Command::Stats { args } => commands::stats::run(&config, &args),
        Command::Config => commands::config::run(&config),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
