use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use eqs_backtest::{BacktestEngine, BacktestReport};
use eqs_config::RunConfig;
use eqs_data::{load_csv_file, DataSource};
use eqs_strategy::HighestGainerStrategy;
use eqs_txlog::TransactionLog;

#[derive(Args)]
pub struct RunArgs {
    /// YAML run configuration (backtest + strategy sections)
    #[arg(long)]
    pub config: PathBuf,

    /// CSV of daily bars (symbol,date,open,close[,volume])
    #[arg(long)]
    pub data: PathBuf,

    /// Mirror the transaction log to this JSONL file
    #[arg(long)]
    pub txlog: Option<PathBuf>,

    /// Write trades.csv, equity.csv and metrics.json into this directory
    #[arg(long = "export-dir")]
    pub export_dir: Option<PathBuf>,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let cfg = RunConfig::from_file(&args.config)?;
    let table = load_csv_file(&args.data)
        .with_context(|| format!("load market data {}", args.data.display()))?;
    let source: Arc<dyn DataSource> = Arc::new(table);

    let strategy = HighestGainerStrategy::new(cfg.strategy.clone(), Arc::clone(&source));
    let mut engine = BacktestEngine::new(cfg.backtest.clone(), Box::new(strategy), source)?;

    let log = match &args.txlog {
        Some(path) => TransactionLog::with_file(path)?,
        None => TransactionLog::new(),
    };
    engine.attach_txlog(log);

    let report = engine.run();
    print_summary(&report);

    if let Some(dir) = &args.export_dir {
        export_report(dir, &report)?;
        println!("exported_to={}", dir.display());
    }
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    let m = &report.metrics;
    println!("initial_capital={}", m.initial_capital);
    println!("final_capital={}", m.final_capital);
    println!("total_return={}", m.total_return);
    println!("total_return_pct={:.2}", m.total_return_pct);
    println!("cagr_pct={:.2}", m.cagr_pct);
    println!("max_drawdown_pct={:.2}", m.max_drawdown_pct);
    println!("max_drawdown_duration_days={}", m.max_drawdown_duration_days);
    println!("sharpe_ratio={}", fmt_opt(m.sharpe_ratio));
    println!("sortino_ratio={}", fmt_opt(m.sortino_ratio));
    println!("num_trades={}", m.num_trades);
    println!("win_rate_pct={:.2}", m.win_rate_pct);
    println!("profit_factor={}", fmt_opt(m.profit_factor));
    println!("avg_holding_days={:.2}", m.avg_holding_days);
    println!("days_traded={}", m.days_traded);
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.4}"),
        None => "n/a".to_string(),
    }
}

/// Write the run artifacts: the realized trades, the equity curve and
/// the metrics record.
fn export_report(dir: &Path, report: &BacktestReport) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create_dir_all {}", dir.display()))?;

    let trades_path = dir.join("trades.csv");
    let mut w = csv::Writer::from_path(&trades_path)
        .with_context(|| format!("open {}", trades_path.display()))?;
    for trade in &report.trades {
        w.serialize(trade)
            .with_context(|| format!("write trade {}", trade.symbol))?;
    }
    w.flush().context("flush trades.csv")?;

    let equity_path = dir.join("equity.csv");
    let mut w = csv::Writer::from_path(&equity_path)
        .with_context(|| format!("open {}", equity_path.display()))?;
    w.write_record(["date", "cash", "positions_value", "total_value", "num_positions"])
        .context("write equity header")?;
    for snap in &report.snapshots {
        w.write_record([
            snap.timestamp.to_string(),
            snap.cash.to_string(),
            snap.positions_value.to_string(),
            snap.total_value.to_string(),
            snap.num_positions().to_string(),
        ])
        .with_context(|| format!("write equity row {}", snap.timestamp))?;
    }
    w.flush().context("flush equity.csv")?;

    let metrics_path = dir.join("metrics.json");
    let json = serde_json::to_string_pretty(&report.metrics).context("serialize metrics")?;
    fs::write(&metrics_path, json)
        .with_context(|| format!("write {}", metrics_path.display()))?;

    Ok(())
}
