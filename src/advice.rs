// 💡 Financial Advice - Rules as Data
// Ordered rule list evaluated against one month of chart data

use crate::charts::ChartData;

/// Savings below this share of income trigger the savings warning
pub const MIN_SAVINGS_RATE: f64 = 0.2;

/// A single category above this share of expenses is flagged
pub const CATEGORY_SHARE_LIMIT: f64 = 0.3;

pub const SAVINGS_ADVICE: &str =
    "Consider increasing your savings by reducing non-essential expenses.";
pub const OVER_BUDGET_ADVICE: &str =
    "Your expenses exceed your income. Consider reviewing your spending habits.";

pub fn category_advice(category: &str) -> String {
    format!(
        "You are spending a lot on {}. Try setting a budget limit.",
        category
    )
}

/// All matching rules, in rule order:
/// 1. low savings rate, 2. dominant categories (map order), 3. over budget.
/// Rules whose reference total is zero do not fire.
pub fn advise(chart: &ChartData) -> Vec<String> {
    let mut advice = Vec::new();
    let income = chart.income();
    let expenses = chart.expenses();
    let savings = income - expenses;

    if income > 0.0 && savings < income * MIN_SAVINGS_RATE {
        advice.push(SAVINGS_ADVICE.to_string());
    }

    if expenses > 0.0 {
        for (category, total) in &chart.category_distribution {
            if *total > expenses * CATEGORY_SHARE_LIMIT {
                advice.push(category_advice(category));
            }
        }
    }

    if expenses > income {
        advice.push(OVER_BUDGET_ADVICE.to_string());
    }

    advice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::IncomeVsExpenses;
    use indexmap::IndexMap;

    fn chart(income: f64, expenses: f64, categories: &[(&str, f64)]) -> ChartData {
        let category_distribution: IndexMap<String, f64> = categories
            .iter()
            .map(|(name, total)| (name.to_string(), *total))
            .collect();

        ChartData {
            category_distribution,
            income_vs_expenses: IncomeVsExpenses { income, expenses },
            spending_trends: IndexMap::new(),
        }
    }

    #[test]
    fn test_savings_and_category_warnings() {
        let advice = advise(&chart(1000.0, 900.0, &[("food", 300.0)]));

        assert_eq!(advice.len(), 2);
        assert_eq!(advice[0], SAVINGS_ADVICE);
        assert_eq!(advice[1], category_advice("food"));
    }

    #[test]
    fn test_healthy_month_has_no_advice() {
        let advice = advise(&chart(
            5000.0,
            1000.0,
            &[("food", 250.0), ("rent", 250.0), ("fun", 250.0), ("transport", 250.0)],
        ));
        assert!(advice.is_empty());
    }

    #[test]
    fn test_over_budget_fires_last() {
        let advice = advise(&chart(500.0, 800.0, &[("rent", 600.0), ("food", 200.0)]));

        assert_eq!(
            advice,
            vec![
                SAVINGS_ADVICE.to_string(),
                category_advice("rent"),
                OVER_BUDGET_ADVICE.to_string(),
            ]
        );
    }

    #[test]
    fn test_categories_reported_in_map_order() {
        let advice = advise(&chart(10_000.0, 1000.0, &[("zoo", 450.0), ("art", 450.0), ("misc", 100.0)]));
        assert_eq!(advice, vec![category_advice("zoo"), category_advice("art")]);
    }

    #[test]
    fn test_zero_income_suppresses_savings_rule() {
        let advice = advise(&chart(0.0, 100.0, &[("food", 100.0)]));

        assert!(!advice.contains(&SAVINGS_ADVICE.to_string()));
        assert_eq!(advice, vec![category_advice("food"), OVER_BUDGET_ADVICE.to_string()]);
    }

    #[test]
    fn test_empty_month() {
        assert!(advise(&ChartData::default()).is_empty());
    }

    #[test]
    fn test_boundary_is_strict() {
        // savings exactly 20% and category exactly 30% do not fire
        let advice = advise(&chart(1000.0, 800.0, &[("food", 240.0), ("rent", 560.0)]));
        assert_eq!(advice, vec![category_advice("rent")]);
    }
}
