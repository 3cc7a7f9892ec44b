// src/main.rs
//! Ledger fraud scanner entry point.
//! Loads a ledger file, scores its transfers and prints the report.
use anyhow::{Context, Result};
use clap::Parser;
use ledger_anomaly::anomaly_detection::{
    AnomalyDetector, DetectionConfig, ScanOutcome, Transaction, NO_TRANSACTIONS_NOTICE,
};
use ledger_anomaly::cli::{Cli, Commands, FraudArgs, OutputFormat};
use ledger_anomaly::ledger::Ledger;
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const NO_TRANSACTIONS_FOUND: &str = "No transactions found.";
const NO_PENDING_FOUND: &str = "No pending balances available.";
const NO_LOGS_FOUND: &str = "No logs available.";

/// Table row for the fraud report
#[derive(Tabled)]
struct FraudRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Amount")]
    amount: f64,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Table row for transaction listings
#[derive(Tabled)]
struct TransactionRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Amount")]
    amount: f64,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging()?;

    info!("Starting ledger-scan v{}", env!("CARGO_PKG_VERSION"));

    let ledger = Ledger::load_or_empty(&cli.ledger);

    match &cli.command {
        Commands::Fraud(args) => run_fraud(&cli, &ledger, args),
        Commands::Transactions => {
            let transactions = ledger.transactions();
            emit_transactions(cli.format, &transactions, NO_TRANSACTIONS_FOUND)
        }
        Commands::Pending => {
            emit_transactions(cli.format, ledger.pending_transactions(), NO_PENDING_FOUND)
        }
        Commands::Logs => {
            let log = ledger.block_log();
            match cli.format {
                OutputFormat::Json => print_json(&log),
                OutputFormat::Table if log.is_empty() => {
                    println!("{}", NO_LOGS_FOUND);
                    Ok(())
                }
                OutputFormat::Table => {
                    println!("Blockchain logs:");
                    for entry in &log {
                        println!("{}", entry);
                    }
                    Ok(())
                }
            }
        }
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Config file, then `LEDGER_SCAN_*` env overrides, then command-line flags.
fn load_config(cli: &Cli, args: &FraudArgs) -> Result<DetectionConfig> {
    let mut config = match &cli.config {
        Some(path) => DetectionConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DetectionConfig::default(),
    };
    config
        .apply_env()
        .context("invalid LEDGER_SCAN_* environment override")?;
    args.apply_to(&mut config);
    Ok(config)
}

fn run_fraud(cli: &Cli, ledger: &Ledger, args: &FraudArgs) -> Result<()> {
    let config = load_config(cli, args)?;
    let detector = AnomalyDetector::with_config(config).context("invalid detection settings")?;

    let transactions = ledger.transactions();
    let report = match detector.scan(&transactions).context("fraud scan failed")? {
        ScanOutcome::NoTransactions => {
            return match cli.format {
                OutputFormat::Json => print_json(&Vec::<()>::new()),
                OutputFormat::Table => {
                    println!("{}", NO_TRANSACTIONS_NOTICE);
                    Ok(())
                }
            };
        }
        ScanOutcome::Scored(report) => report,
    };

    match cli.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            let rows: Vec<FraudRow> = report
                .rows
                .iter()
                .map(|row| FraudRow {
                    from: row.from.clone(),
                    to: row.to.clone(),
                    amount: row.amount,
                    reason: row.reason.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
            Ok(())
        }
    }
}

fn emit_transactions(format: OutputFormat, transactions: &[Transaction], notice: &str) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&transactions),
        OutputFormat::Table if transactions.is_empty() => {
            println!("{}", notice);
            Ok(())
        }
        OutputFormat::Table => {
            let rows: Vec<TransactionRow> = transactions
                .iter()
                .map(|tx| TransactionRow {
                    from: tx.from_address.clone(),
                    to: tx.to_address.clone(),
                    amount: tx.amount,
                    kind: tx.kind.clone().unwrap_or_default(),
                    timestamp: tx.timestamp.clone().unwrap_or_default(),
                })
                .collect();
            println!("{}", Table::new(rows));
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
