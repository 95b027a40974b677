use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use eqs_data::{load_csv_file, DataSource};

#[derive(Args)]
pub struct InspectArgs {
    /// CSV of daily bars to summarize
    #[arg(long)]
    pub data: PathBuf,
}

pub fn execute(args: InspectArgs) -> Result<()> {
    let table = load_csv_file(&args.data)
        .with_context(|| format!("load market data {}", args.data.display()))?;

    println!("symbols={}", table.symbol_count());
    for symbol in table.symbols() {
        let bars = table.bar_count(&symbol);
        match table.date_range(&symbol) {
            Some((first, last)) => {
                println!("symbol={symbol} bars={bars} first={first} last={last}")
            }
            None => println!("symbol={symbol} bars=0"),
        }
    }
    Ok(())
}
