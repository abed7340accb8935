// 📦 Domain Types
// Validated transactions (write path) vs schema-less stored records (read path)

use crate::charts::ChartData;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// Strict parse used at the ingest boundary: only `income` / `expense`
    pub fn parse_strict(value: &str) -> Option<Self> {
        match value {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }

    /// Lenient parse for documents already in the store.
    /// Older documents spell expenses in the plural, sometimes capitalized.
    pub fn parse_stored(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "income" => Some(TransactionType::Income),
            "expense" | "expenses" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TRANSACTION (validated, immutable once written)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub category: String,
    /// ISO-8601 date, `YYYY-MM-DD` or a full timestamp
    pub date: String,
    /// Assigned by the store on append
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Build a validated transaction from loosely typed input.
    /// A missing date defaults to today (UTC).
    pub fn new(
        kind: &str,
        amount: f64,
        category: &str,
        date: Option<&str>,
    ) -> AppResult<Self> {
        let kind = TransactionType::parse_strict(kind)
            .ok_or_else(|| AppError::validation("Invalid transaction type"))?;

        if !amount.is_finite() || amount < 0.0 {
            return Err(AppError::validation(
                "Amount must be a non-negative number",
            ));
        }

        let category = category.trim();
        if category.is_empty() {
            return Err(AppError::validation("Missing required fields"));
        }

        let date = match date {
            Some(d) => normalize_date(d)?,
            None => Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        };

        Ok(Transaction {
            kind,
            amount,
            category: category.to_string(),
            date,
            timestamp: None,
        })
    }

    /// Bucket key (`YYYY-MM`) this transaction is filed under
    pub fn month(&self) -> String {
        self.date.chars().take(7).collect()
    }
}

/// Zero-pad the calendar part so `month()` and trend keys line up with
/// `YYYY-MM` lookups; any time suffix is kept as given.
fn normalize_date(date: &str) -> AppResult<String> {
    let date = date.trim();
    let split = date.find(|c: char| c == 'T' || c == ' ').unwrap_or(date.len());
    let (day, time) = date.split_at(split);

    let day = NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date: {}", date)))?;
    Ok(format!("{}{}", day.format("%Y-%m-%d"), time))
}

// ============================================================================
// RAW RECORD (schema-less document as read back from the store)
// ============================================================================

/// Any field may be absent in legacy documents; aggregation skips
/// records that lack what it needs instead of failing the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RawRecord {
    pub fn transaction_type(&self) -> Option<TransactionType> {
        self.kind.as_deref().and_then(TransactionType::parse_stored)
    }

    /// Amount of an expense-type record, None for anything else
    pub fn expense_amount(&self) -> Option<f64> {
        match self.transaction_type() {
            Some(TransactionType::Expense) => self.amount,
            _ => None,
        }
    }
}

impl From<&Transaction> for RawRecord {
    fn from(tx: &Transaction) -> Self {
        RawRecord {
            kind: Some(tx.kind.as_str().to_string()),
            amount: Some(tx.amount),
            category: Some(tx.category.clone()),
            date: Some(tx.date.clone()),
            timestamp: tx.timestamp.map(|ts| ts.to_rfc3339()),
        }
    }
}

// ============================================================================
// MONTHLY ANALYTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAnalytics {
    pub user_id: String,
    pub month: String,
    pub chart_data: ChartData,
    pub anomalies: Vec<f64>,
    pub financial_advice: Vec<String>,
}

// ============================================================================
// TESTS
// ============================================================================
