// 💰 Savings Planner
// Splits income into a savings target and a spendable balance

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SavingMode {
    /// 30% of income
    #[default]
    Easy,
    /// 50% of income
    Normal,
    /// 80% of income
    Hard,
}

impl SavingMode {
    /// 30, 50 and 80 select a mode; anything else falls back to Easy.
    /// Compared by value, so `50.0` from a JSON client selects Normal.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage == 50.0 {
            SavingMode::Normal
        } else if percentage == 80.0 {
            SavingMode::Hard
        } else {
            SavingMode::Easy
        }
    }

    pub fn rate(&self) -> f64 {
        match self {
            SavingMode::Easy => 0.30,
            SavingMode::Normal => 0.50,
            SavingMode::Hard => 0.80,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SavingMode::Easy => "Easy (30%)",
            SavingMode::Normal => "Normal (50%)",
            SavingMode::Hard => "Hard (80%)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancePlan {
    pub total_income: f64,
    pub savings: f64,
    pub balance: f64,
}

pub fn initialize_balance(total_income: f64, mode: SavingMode) -> AppResult<BalancePlan> {
    if !total_income.is_finite() || total_income < 0.0 {
        return Err(AppError::validation(
            "totalIncome must be a non-negative number",
        ));
    }

    let savings = total_income * mode.rate();
    Ok(BalancePlan {
        total_income,
        savings,
        balance: total_income - savings,
    })
}

/// What is left after spending and setting the savings target aside
pub fn remaining_balance(income: f64, expenses: f64, savings: f64) -> f64 {
    income - expenses - savings
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinancialStatus {
    /// Spending ate into the savings target
    OverSavingsTarget,
    AnomaliesDetected(Vec<f64>),
    Healthy,
}

impl FinancialStatus {
    pub fn message(&self) -> String {
        match self {
            FinancialStatus::OverSavingsTarget => {
                "Your expenses exceed your savings target!".to_string()
            }
            FinancialStatus::AnomaliesDetected(values) => {
                format!("Anomalies detected: {:?}", values)
            }
            FinancialStatus::Healthy => "Your finances are healthy.".to_string(),
        }
    }
}

/// Over-target spending takes precedence over anomalies
pub fn assess(income: f64, expenses: f64, savings: f64, anomalies: &[f64]) -> FinancialStatus {
    if expenses > income - savings {
        FinancialStatus::OverSavingsTarget
    } else if !anomalies.is_empty() {
        FinancialStatus::AnomaliesDetected(anomalies.to_vec())
    } else {
        FinancialStatus::Healthy
    }
}
