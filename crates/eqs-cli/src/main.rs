use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "equisim")]
#[command(about = "Daily-rebalanced equity backtest simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a YAML config over a CSV of daily bars
    Run(commands::run::RunArgs),

    /// Summarize a CSV of daily bars (symbols, bar counts, date ranges)
    InspectData(commands::inspect::InspectArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run(args) => commands::run::execute(args),
        Commands::InspectData(args) => commands::inspect::execute(args),
    }
}
