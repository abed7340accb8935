// 🧮 Finance Service
// Monthly analytics, transaction ingest, and batch persistence over a store

use crate::advice::advise;
use crate::charts::aggregate;
use crate::db::TransactionStore;
use crate::detector::AnomalyDetector;
use crate::error::{AppError, AppResult};
use crate::models::{MonthlyAnalytics, RawRecord, Transaction};
use crate::outbox::AnalyticsOutbox;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const TRANSACTION_ADDED: &str = "Transaction added successfully";
pub const ANALYTICS_SAVED: &str = "All analytics have been saved";

/// Ingest input as it arrives over the wire; every field optional so
/// missing ones produce a validation error rather than a parse failure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub user_id: Option<String>,
    pub transaction_type: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub message: String,
    pub anomalies: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub message: String,
    pub saved: usize,
}

#[derive(Clone)]
pub struct FinanceService {
    store: Arc<dyn TransactionStore>,
    detector: AnomalyDetector,
    outbox: Arc<AnalyticsOutbox>,
    buffer_results: bool,
}

impl FinanceService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        detector: AnomalyDetector,
        outbox: Arc<AnalyticsOutbox>,
    ) -> Self {
        FinanceService {
            store,
            detector,
            outbox,
            buffer_results: true,
        }
    }

    /// Whether monthly analytics are queued for the next batch save
    pub fn with_buffering(mut self, enabled: bool) -> Self {
        self.buffer_results = enabled;
        self
    }

    pub fn outbox(&self) -> &AnalyticsOutbox {
        &self.outbox
    }

    pub fn store(&self) -> &dyn TransactionStore {
        self.store.as_ref()
    }

    // ========================================================================
    // MONTHLY ANALYTICS
    // ========================================================================

    /// Chart data, anomalies and advice for one bucket. Read-only on the store.
    pub fn monthly_analytics(&self, user_id: &str, month: &str) -> AppResult<MonthlyAnalytics> {
        let (user_id, month) = bucket_key(user_id, month)?;

        let records = self.store.month_records(user_id, month)?;
        let expenses = expense_amounts(&records);
        debug!(user_id, month, expenses = ?expenses, "expenses for anomaly detection");

        let anomalies = self.detector.detect(&expenses)?;
        let chart_data = aggregate(&records);
        let financial_advice = advise(&chart_data);

        let analytics = MonthlyAnalytics {
            user_id: user_id.to_string(),
            month: month.to_string(),
            chart_data,
            anomalies,
            financial_advice,
        };

        if self.buffer_results {
            self.outbox.push(analytics.clone());
        }

        info!(
            user_id,
            month,
            records = records.len(),
            anomalies = analytics.anomalies.len(),
            "monthly analytics computed"
        );

        Ok(analytics)
    }

    pub fn saved_analytics(&self, user_id: &str, month: &str) -> AppResult<MonthlyAnalytics> {
        let (user_id, month) = bucket_key(user_id, month)?;
        self.store.load_analysis(user_id, month)?.ok_or_else(|| {
            AppError::NotFound(format!("No saved analytics for {} / {}", user_id, month))
        })
    }

    // ========================================================================
    // TRANSACTION INGEST
    // ========================================================================

    /// Validate, append, then rescan the user's whole expense history.
    /// Nothing is written when validation fails.
    pub fn add_transaction(&self, input: NewTransaction) -> AppResult<IngestOutcome> {
        let (user_id, kind, amount, category) = match (
            non_blank(input.user_id.as_deref()),
            non_blank(input.transaction_type.as_deref()),
            input.amount,
            non_blank(input.category.as_deref()),
        ) {
            (Some(u), Some(k), Some(a), Some(c)) => (u, k, a, c),
            _ => return Err(AppError::validation("Missing required fields")),
        };

        let tx = Transaction::new(kind, amount, category, input.date.as_deref())?;
        let month = tx.month();
        let record_id = self.store.append(user_id, &month, &tx)?;

        let anomalies = self.user_anomalies(user_id)?;

        info!(
            user_id,
            month = %month,
            record_id = %record_id,
            kind = %tx.kind,
            anomalies = anomalies.len(),
            "transaction added"
        );

        Ok(IngestOutcome {
            message: TRANSACTION_ADDED.to_string(),
            anomalies,
        })
    }

    /// Anomaly scan over every expense the user has ever recorded.
    /// O(n) per call, fine at personal-ledger scale.
    pub fn user_anomalies(&self, user_id: &str) -> AppResult<Vec<f64>> {
        let history = self.store.user_records(user_id)?;
        self.detector.detect(&expense_amounts(&history))
    }

    // ========================================================================
    // BATCH PERSISTENCE
    // ========================================================================

    pub fn save_all_analytics(&self) -> AppResult<SaveOutcome> {
        match self.outbox.flush(self.store.as_ref()) {
            Ok(saved) => Ok(SaveOutcome {
                message: ANALYTICS_SAVED.to_string(),
                saved,
            }),
            Err(err) => Err(AppError::StoreUnavailable(format!(
                "saved {} analytics, {} still pending: {}",
                err.saved, err.requeued, err.source
            ))),
        }
    }
}

/// Expense amounts in store order; the detector's input
pub fn expense_amounts(records: &[RawRecord]) -> Vec<f64> {
    records.iter().filter_map(RawRecord::expense_amount).collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// Ingest stores the trimmed userId, so lookups trim too
fn bucket_key<'a>(user_id: &'a str, month: &'a str) -> AppResult<(&'a str, &'a str)> {
    match (non_blank(Some(user_id)), non_blank(Some(month))) {
        (Some(user_id), Some(month)) => Ok((user_id, month)),
        _ => Err(AppError::validation("userId and month are required")),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{category_advice, SAVINGS_ADVICE};
    use crate::db::SqliteStore;
    use crate::detector::tests::sample_forest;
    use crate::detector::MeanThreshold;

    fn service() -> (FinanceService, SqliteStore) {
        let store = SqliteStore::open_in_memory().unwrap();
        let detector = AnomalyDetector::new(Arc::new(MeanThreshold { factor: 2.0 }));
        let service = FinanceService::new(
            Arc::new(store.clone()),
            detector,
            Arc::new(AnalyticsOutbox::new()),
        );
        (service, store)
    }

    fn new_tx(user: &str, kind: &str, amount: f64, category: &str, date: &str) -> NewTransaction {
        NewTransaction {
            user_id: Some(user.to_string()),
            transaction_type: Some(kind.to_string()),
            amount: Some(amount),
            category: Some(category.to_string()),
            date: Some(date.to_string()),
        }
    }

    fn seed_legacy(store: &SqliteStore, user: &str, month: &str, docs: &[&str]) {
        for doc in docs {
            let record: RawRecord = serde_json::from_str(doc).unwrap();
            store.append_document(user, month, &record).unwrap();
        }
    }

    #[test]
    fn test_monthly_analytics_reference_month() {
        let (service, store) = service();
        seed_legacy(
            &store,
            "alice",
            "2024-01",
            &[
                r#"{"type": "income", "amount": 1000.0, "category": "salary", "date": "2024-01-01"}"#,
                r#"{"type": "expenses", "amount": 400.0, "category": "food", "date": "2024-01-05"}"#,
                r#"{"type": "expenses", "amount": 200.0, "category": "food", "date": "2024-01-06"}"#,
            ],
        );

        let analytics = service.monthly_analytics("alice", "2024-01").unwrap();

        assert_eq!(analytics.user_id, "alice");
        assert_eq!(analytics.chart_data.income(), 1000.0);
        assert_eq!(analytics.chart_data.expenses(), 600.0);
        assert_eq!(analytics.chart_data.category_distribution["food"], 600.0);
        assert!(analytics.anomalies.is_empty());
        assert_eq!(analytics.financial_advice, vec![category_advice("food")]);
    }

    #[test]
    fn test_monthly_analytics_flags_outlier_and_buffers() {
        let (service, store) = service();
        for (amount, day) in [(20.0, "01"), (25.0, "02"), (18.0, "03"), (22.0, "04"), (900.0, "05")] {
            let date = format!("2024-03-{}", day);
            store
                .append("bob", "2024-03", &Transaction::new("expense", amount, "misc", Some(&date)).unwrap())
                .unwrap();
        }

        let analytics = service.monthly_analytics("bob", "2024-03").unwrap();
        assert_eq!(analytics.anomalies, vec![900.0]);
        // no income recorded, so the savings-rate rule stays quiet
        assert!(!analytics.financial_advice.contains(&SAVINGS_ADVICE.to_string()));
        assert_eq!(service.outbox().len(), 1);
        assert_eq!(service.outbox().snapshot()[0], analytics);
    }

    #[test]
    fn test_anomalies_are_subset_of_month_expenses() {
        let (service, store) = service();
        seed_legacy(
            &store,
            "carol",
            "2024-04",
            &[
                r#"{"type": "income", "amount": 99999.0, "category": "salary"}"#,
                r#"{"type": "expense", "amount": 10.0, "category": "food"}"#,
                r#"{"type": "expense", "amount": 500.0, "category": "travel"}"#,
                r#"{"type": "expense", "amount": 12.0, "category": "food"}"#,
            ],
        );

        let analytics = service.monthly_analytics("carol", "2024-04").unwrap();
        let expenses = [10.0, 500.0, 12.0];
        assert!(!analytics.anomalies.is_empty());
        assert!(analytics.anomalies.iter().all(|a| expenses.contains(a)));
        assert!(!analytics.anomalies.contains(&99999.0));
    }

    #[test]
    fn test_buffering_can_be_disabled() {
        let (service, _store) = service();
        let service = service.with_buffering(false);

        service.monthly_analytics("dave", "2024-01").unwrap();
        assert!(service.outbox().is_empty());
    }

    #[test]
    fn test_empty_bucket() {
        let (service, _store) = service();
        let analytics = service.monthly_analytics("nobody", "2030-12").unwrap();

        assert!(analytics.anomalies.is_empty());
        assert!(analytics.financial_advice.is_empty());
        assert!(analytics.chart_data.category_distribution.is_empty());
    }

    #[test]
    fn test_monthly_analytics_requires_key() {
        let (service, _store) = service();
        assert!(matches!(
            service.monthly_analytics(" ", "2024-01"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_add_transaction_files_under_month() {
        let (service, store) = service();

        let outcome = service
            .add_transaction(new_tx("erin", "expense", 42.0, "food", "2024-05-17"))
            .unwrap();

        assert_eq!(outcome.message, TRANSACTION_ADDED);
        assert!(outcome.anomalies.is_empty());

        let records = store.month_records("erin", "2024-05").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, Some(42.0));
    }

    #[test]
    fn test_unpadded_date_lands_in_month_bucket() {
        let (service, store) = service();

        service.add_transaction(new_tx("uma", "expense", 10.0, "food", "2024-1-5")).unwrap();

        let analytics = service.monthly_analytics("uma", "2024-01").unwrap();
        assert_eq!(analytics.chart_data.expenses(), 10.0);
        assert_eq!(analytics.chart_data.spending_trends["2024-01-05"], 10.0);
        assert!(store.month_records("uma", "2024-1-").unwrap().is_empty());
    }

    #[test]
    fn test_user_id_is_trimmed_on_both_paths() {
        let (service, _store) = service();

        service.add_transaction(new_tx(" alice ", "expense", 25.0, "food", "2024-02-02")).unwrap();

        let analytics = service.monthly_analytics(" alice", "2024-02 ").unwrap();
        assert_eq!(analytics.user_id, "alice");
        assert_eq!(analytics.month, "2024-02");
        assert_eq!(analytics.chart_data.expenses(), 25.0);

        service.save_all_analytics().unwrap();
        assert!(service.saved_analytics("alice ", "2024-02").is_ok());
    }

    #[test]
    fn test_add_transaction_rescans_full_history() {
        let (service, _store) = service();

        for (amount, date) in [(30.0, "2024-01-03"), (35.0, "2024-02-03"), (28.0, "2024-03-03")] {
            service.add_transaction(new_tx("frank", "expense", amount, "food", date)).unwrap();
        }
        service.add_transaction(new_tx("frank", "income", 5000.0, "salary", "2024-03-01")).unwrap();

        // Outlier only stands out against earlier months
        let outcome = service
            .add_transaction(new_tx("frank", "expense", 400.0, "travel", "2024-04-10"))
            .unwrap();
        assert_eq!(outcome.anomalies, vec![400.0]);
    }

    #[test]
    fn test_add_transaction_rejects_invalid_type_without_writing() {
        let (service, store) = service();

        let err = service
            .add_transaction(new_tx("gina", "loan", 100.0, "bank", "2024-01-01"))
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Invalid transaction type");
        assert_eq!(store.count_records("gina").unwrap(), 0);
    }

    #[test]
    fn test_add_transaction_missing_fields() {
        let (service, store) = service();

        let mut input = new_tx("hank", "income", 10.0, "gift", "2024-01-01");
        input.amount = None;
        let err = service.add_transaction(input).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");

        let mut input = new_tx("hank", "income", 10.0, "gift", "2024-01-01");
        input.category = Some("   ".to_string());
        assert!(service.add_transaction(input).is_err());

        assert_eq!(store.count_records("hank").unwrap(), 0);
    }

    #[test]
    fn test_save_all_analytics() {
        let (service, store) = service();

        let outcome = service.save_all_analytics().unwrap();
        assert_eq!(outcome.message, ANALYTICS_SAVED);
        assert_eq!(outcome.saved, 0);

        service.monthly_analytics("ivy", "2024-01").unwrap();
        service.monthly_analytics("ivy", "2024-02").unwrap();

        let outcome = service.save_all_analytics().unwrap();
        assert_eq!(outcome.saved, 2);
        assert!(service.outbox().is_empty());
        assert!(store.load_analysis("ivy", "2024-02").unwrap().is_some());
        assert_eq!(service.saved_analytics("ivy", "2024-01").unwrap().month, "2024-01");
    }

    #[test]
    fn test_saved_analytics_not_found() {
        let (service, _store) = service();
        assert!(matches!(
            service.saved_analytics("jay", "2024-01"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_works_with_isolation_forest() {
        let store = SqliteStore::open_in_memory().unwrap();
        let service = FinanceService::new(
            Arc::new(store),
            AnomalyDetector::new(Arc::new(sample_forest())),
            Arc::new(AnalyticsOutbox::new()),
        );

        service.add_transaction(new_tx("kim", "expense", 60.0, "food", "2024-06-01")).unwrap();
        let outcome = service
            .add_transaction(new_tx("kim", "expense", 12_000.0, "car", "2024-06-02"))
            .unwrap();
        assert_eq!(outcome.anomalies, vec![12_000.0]);
    }
}
