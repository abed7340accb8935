// ezmoney - Personal Finance Analytics
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod config;
pub mod models;
pub mod db;
pub mod charts;      // Chart data aggregation
pub mod advice;      // Budgeting advice rules
pub mod detector;    // Pre-trained anomaly model
pub mod budget;      // Savings planner
pub mod outbox;      // Analytics awaiting batch save
pub mod service;
pub mod import;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use config::Config;
pub use models::{MonthlyAnalytics, RawRecord, Transaction, TransactionType};
pub use db::{setup_database, SqliteStore, TransactionStore};
pub use charts::{aggregate, ChartData, IncomeVsExpenses};
pub use advice::advise;
pub use detector::{AnomalyDetector, IsolationForest, MeanThreshold, ModelArtifact, OutlierModel};
pub use budget::{assess, initialize_balance, remaining_balance, BalancePlan, FinancialStatus, SavingMode};
pub use outbox::AnalyticsOutbox;
pub use service::{FinanceService, IngestOutcome, NewTransaction, SaveOutcome};
pub use import::{import_csv, ImportReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
