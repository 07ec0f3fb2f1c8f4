use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scout_app::Launch;
use scout_common::RecordKind;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Scrape job boards and company pages, email what is new")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $SCOUT_CONFIG, then ./scout.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long, env = "SCOUT_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Keyword-matching job postings
    Jobs,
    /// Company contact emails
    Leads,
    /// Both pipelines, jobs first
    All,
}

impl Commands {
    fn kinds(self) -> &'static [RecordKind] {
        match self {
            Commands::Jobs => &[RecordKind::Job],
            Commands::Leads => &[RecordKind::Lead],
            Commands::All => &RecordKind::ALL,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    Launch {
        config: cli.config,
        json_logs: cli.json_logs,
    }
    .run("scout", cli.command.kinds())
    .await
}
