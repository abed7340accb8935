// 📊 Chart Data Aggregation
// Category totals, income vs expenses, and per-day spending for one bucket

use crate::models::{RawRecord, TransactionType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Trend key used when a record carries no date
pub const UNKNOWN_DATE: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeVsExpenses {
    pub income: f64,
    pub expenses: f64,
}

/// Derived on every request, never the system of record.
/// Maps keep first-insertion order so advice and charts are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub category_distribution: IndexMap<String, f64>,
    pub income_vs_expenses: IncomeVsExpenses,
    pub spending_trends: IndexMap<String, f64>,
}

impl ChartData {
    pub fn income(&self) -> f64 {
        self.income_vs_expenses.income
    }

    pub fn expenses(&self) -> f64 {
        self.income_vs_expenses.expenses
    }

    pub fn balance(&self) -> f64 {
        self.income() - self.expenses()
    }
}

/// Single pass over the records in the given order.
/// Records missing amount, type or category are skipped, unknown types ignored.
pub fn aggregate(records: &[RawRecord]) -> ChartData {
    let mut chart = ChartData::default();

    for record in records {
        let (Some(kind), Some(amount), Some(category)) =
            (record.kind.as_deref(), record.amount, record.category.as_deref())
        else {
            continue;
        };

        match TransactionType::parse_stored(kind) {
            Some(TransactionType::Income) => {
                chart.income_vs_expenses.income += amount;
            }
            Some(TransactionType::Expense) => {
                chart.income_vs_expenses.expenses += amount;

                *chart
                    .category_distribution
                    .entry(category.to_string())
                    .or_insert(0.0) += amount;

                *chart
                    .spending_trends
                    .entry(trend_key(record.date.as_deref()))
                    .or_insert(0.0) += amount;
            }
            None => {}
        }
    }

    chart
}

/// First 10 characters of the date (`YYYY-MM-DD`)
fn trend_key(date: Option<&str>) -> String {
    match date {
        Some(d) => d.chars().take(10).collect(),
        None => UNKNOWN_DATE.to_string(),
    }
}
