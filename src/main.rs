// ezmoney CLI - import ledgers, print monthly reports, plan savings

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ezmoney::{
    assess, import_csv, initialize_balance, remaining_balance, AnalyticsOutbox, AnomalyDetector,
    Config, FinanceService, SavingMode, SqliteStore,
};

#[derive(Parser)]
#[command(name = "ezmoney", version, about = "Personal finance tracking and analytics")]
struct Cli {
    /// Database file (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Anomaly model artifact (overrides config)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import transactions from a CSV file (type,amount,category,date)
    Import {
        csv: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Print chart data, anomalies and advice for one month
    Report {
        user: String,
        month: String,
        /// Savings target used for the remaining-balance line
        #[arg(long, default_value_t = 30.0)]
        mode: f64,
    },
    /// Split an income into savings and spendable balance
    Plan {
        income: f64,
        #[arg(long, default_value_t = 30.0)]
        mode: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ezmoney=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.storage.database_path = db;
    }
    if let Some(model) = cli.model {
        config.model.artifact_path = model;
    }

    match cli.command {
        Command::Plan { income, mode } => run_plan(income, mode),
        Command::Import { csv, user } => run_import(&config, &csv, &user),
        Command::Report { user, month, mode } => run_report(&config, &user, &month, mode),
    }
}

fn open_service(config: &Config) -> Result<FinanceService> {
    let store = SqliteStore::open(&config.storage.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.storage.database_path))?;
    let detector = AnomalyDetector::load(&config.model.artifact_path)?;

    // CLI runs are one-shot; nothing would ever flush a buffer
    Ok(FinanceService::new(Arc::new(store), detector, Arc::new(AnalyticsOutbox::new()))
        .with_buffering(false))
}

fn run_plan(income: f64, mode: f64) -> Result<()> {
    let mode = SavingMode::from_percentage(mode);
    let plan = initialize_balance(income, mode)?;

    println!("💰 Savings plan ({})", mode.label());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Total income: {:>14.2}", plan.total_income);
    println!("  Savings:      {:>14.2}", plan.savings);
    println!("  Balance:      {:>14.2}", plan.balance);

    Ok(())
}

fn run_import(config: &Config, csv: &Path, user: &str) -> Result<()> {
    let service = open_service(config)?;
    let file = File::open(csv).with_context(|| format!("Failed to open CSV file {:?}", csv))?;

    println!("📂 Importing {:?} for {}...", csv, user);
    let report = import_csv(&service, user, file)?;

    println!("✓ Inserted: {} transactions", report.inserted);
    if !report.rejected.is_empty() {
        println!("✗ Rejected: {} rows", report.rejected.len());
        for (line, reason) in &report.rejected {
            println!("    line {}: {}", line, reason);
        }
    }
    if !report.anomalies.is_empty() {
        println!("⚠️  Anomalous expenses in history: {:?}", report.anomalies);
    }

    Ok(())
}

fn run_report(config: &Config, user: &str, month: &str, mode: f64) -> Result<()> {
    let service = open_service(config)?;
    let analytics = service.monthly_analytics(user, month)?;
    let chart = &analytics.chart_data;

    println!("📊 {} - {}", user, month);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Income:   {:>14.2}", chart.income());
    println!("  Expenses: {:>14.2}", chart.expenses());
    println!("  Balance:  {:>14.2}", chart.balance());

    if !chart.category_distribution.is_empty() {
        println!("\nBy category:");
        for (category, total) in &chart.category_distribution {
            let share = if chart.expenses() > 0.0 {
                total / chart.expenses() * 100.0
            } else {
                0.0
            };
            println!("  {:<20} {:>12.2}  {:>5.1}%", category, total, share);
        }
    }

    if !chart.spending_trends.is_empty() {
        println!("\nDaily spending:");
        for (day, total) in &chart.spending_trends {
            println!("  {:<20} {:>12.2}", day, total);
        }
    }

    let saving_mode = SavingMode::from_percentage(mode);
    let savings = chart.income() * saving_mode.rate();
    println!("\nSavings target ({}): {:.2}", saving_mode.label(), savings);
    println!(
        "Remaining after target: {:.2}",
        remaining_balance(chart.income(), chart.expenses(), savings)
    );

    let status = assess(chart.income(), chart.expenses(), savings, &analytics.anomalies);
    println!("\n{}", status.message());

    if !analytics.financial_advice.is_empty() {
        println!("\n💡 Advice:");
        for advice in &analytics.financial_advice {
            println!("  - {}", advice);
        }
    }

    Ok(())
}
