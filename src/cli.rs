use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::coordinator::{file_storage, StatusReport};
use crate::error::Result;
use crate::strategy::VixGearSelector;

#[derive(Parser)]
#[command(name = "niftygear")]
#[command(version = "0.1.0")]
#[command(about = "NIFTY signal-to-execution decision engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment overrides
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the decision loop until Ctrl-C
    Run,
    /// Evaluate the newest closed bar once and exit
    Once,
    /// Print the persisted snapshots
    Status,
    /// Show the gear and lot size for a volatility reading
    Gear {
        /// Volatility index value
        #[arg(long)]
        vix: f64,
        /// Capital to size against (defaults to risk.capital)
        #[arg(long)]
        capital: Option<Decimal>,
    },
}

pub async fn show_status(config: &AppConfig) -> Result<()> {
    let report = StatusReport::collect(&file_storage(config)).await?;

    println!("\n\x1b[36m═══ niftygear status ({}) ═══\x1b[0m", config.storage.state_dir.display());
    match &report.position {
        Some(p) => println!(
            "Position:  {}  entry={}  trades={}",
            p.state,
            p.entry_price.map_or("-".to_string(), |e| format!("{e:.2}")),
            p.trade_count
        ),
        None => println!("Position:  (no snapshot)"),
    }
    if let Some(pnl) = &report.pnl {
        println!(
            "PnL:       realized={}  unrealized={}  equity={}",
            pnl.realized, pnl.unrealized, pnl.equity
        );
    }
    if let Some(vix) = &report.vix {
        println!("Gear:      {}  vix={}  lots={}", vix.context.gear, vix.context.vix, vix.lots);
    }
    if let Some(intent) = report.execution.as_ref().and_then(|e| e.last_intent.as_ref()) {
        println!("Intent:    {}  {}", intent.intent.as_str(), intent.reason);
    }
    println!("Events:    {}", report.events);

    println!("\n{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn show_gear(config: &AppConfig, vix: f64, capital: Option<Decimal>) {
    let selector = VixGearSelector::new(&config.gear);
    let context = selector.select(vix);
    let capital = capital.unwrap_or(config.risk.capital);
    let lots = selector.size_lots(context.gear, capital);

    println!("VIX:      {vix}");
    println!("Gear:     {}", context.gear);
    println!("Reason:   {}", context.reason);
    println!("Capital:  {capital}");
    println!("Lots:     {lots}");
}
