// 🗄️ Transaction Store
// Document-style storage keyed user → month → records, backed by SQLite + WAL
//
// Records are kept as JSON documents so legacy rows with missing or extra
// fields survive a round trip; the typed view lives in models.rs.

use crate::error::{AppError, AppResult};
use crate::models::{MonthlyAnalytics, RawRecord, Transaction};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// External document store seen by the service layer
pub trait TransactionStore: Send + Sync {
    /// Append one immutable record to the user's month bucket.
    /// Returns the store-assigned record id.
    fn append(&self, user_id: &str, month: &str, tx: &Transaction) -> AppResult<String>;

    /// All records of one bucket, in insertion order
    fn month_records(&self, user_id: &str, month: &str) -> AppResult<Vec<RawRecord>>;

    /// Every record the user owns, across all months, in insertion order
    fn user_records(&self, user_id: &str) -> AppResult<Vec<RawRecord>>;

    /// Write the analysis result for (user, month); last write wins
    fn save_analysis(&self, analytics: &MonthlyAnalytics) -> AppResult<()>;

    fn load_analysis(&self, user_id: &str, month: &str) -> AppResult<Option<MonthlyAnalytics>>;
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT UNIQUE NOT NULL,
            user_id TEXT NOT NULL,
            month TEXT NOT NULL,
            document TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS analysis_results (
            user_id TEXT NOT NULL,
            month TEXT NOT NULL,
            document TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            PRIMARY KEY (user_id, month)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_bucket ON records(user_id, month)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::StoreUnavailable("connection lock poisoned".to_string()))
    }

    /// Append a raw document as-is; used by imports of legacy data
    pub fn append_document(
        &self,
        user_id: &str,
        month: &str,
        record: &RawRecord,
    ) -> AppResult<String> {
        let record_id = uuid::Uuid::new_v4().to_string();
        let document = serde_json::to_string(record)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO records (record_id, user_id, month, document, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record_id, user_id, month, document, Utc::now().to_rfc3339()],
        )?;

        Ok(record_id)
    }

    pub fn count_records(&self, user_id: &str) -> AppResult<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_documents(documents: Vec<String>) -> AppResult<Vec<RawRecord>> {
    documents
        .iter()
        .map(|doc| serde_json::from_str::<RawRecord>(doc).map_err(AppError::from))
        .collect()
}

impl TransactionStore for SqliteStore {
    fn append(&self, user_id: &str, month: &str, tx: &Transaction) -> AppResult<String> {
        let mut stamped = tx.clone();
        stamped.timestamp = Some(Utc::now());

        let record_id = self.append_document(user_id, month, &RawRecord::from(&stamped))?;
        debug!(user_id, month, record_id = %record_id, "record appended");
        Ok(record_id)
    }

    fn month_records(&self, user_id: &str, month: &str) -> AppResult<Vec<RawRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT document FROM records
             WHERE user_id = ?1 AND month = ?2
             ORDER BY id ASC",
        )?;

        let documents = stmt
            .query_map(params![user_id, month], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        parse_documents(documents)
    }

    fn user_records(&self, user_id: &str) -> AppResult<Vec<RawRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT document FROM records
             WHERE user_id = ?1
             ORDER BY id ASC",
        )?;

        let documents = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        parse_documents(documents)
    }

    fn save_analysis(&self, analytics: &MonthlyAnalytics) -> AppResult<()> {
        let document = serde_json::to_string(analytics)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO analysis_results (user_id, month, document, saved_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, month) DO UPDATE SET
                document = excluded.document,
                saved_at = excluded.saved_at",
            params![
                analytics.user_id,
                analytics.month,
                document,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    fn load_analysis(&self, user_id: &str, month: &str) -> AppResult<Option<MonthlyAnalytics>> {
        let conn = self.lock()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM analysis_results WHERE user_id = ?1 AND month = ?2",
                params![user_id, month],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartData;

    fn expense(amount: f64, category: &str, date: &str) -> Transaction {
        Transaction::new("expense", amount, category, Some(date)).unwrap()
    }

    fn analytics(user_id: &str, month: &str, anomalies: Vec<f64>) -> MonthlyAnalytics {
        MonthlyAnalytics {
            user_id: user_id.to_string(),
            month: month.to_string(),
            chart_data: ChartData::default(),
            anomalies,
            financial_advice: vec![],
        }
    }

    #[test]
    fn test_records_are_bucketed_by_user_and_month() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.append("alice", "2024-01", &expense(10.0, "food", "2024-01-03")).unwrap();
        store.append("alice", "2024-01", &expense(20.0, "rent", "2024-01-04")).unwrap();
        store.append("alice", "2024-02", &expense(30.0, "food", "2024-02-01")).unwrap();
        store.append("bob", "2024-01", &expense(99.0, "fun", "2024-01-09")).unwrap();

        let january = store.month_records("alice", "2024-01").unwrap();
        assert_eq!(january.len(), 2);
        assert_eq!(january[0].amount, Some(10.0));
        assert_eq!(january[1].category.as_deref(), Some("rent"));

        assert_eq!(store.user_records("alice").unwrap().len(), 3);
        assert_eq!(store.count_records("bob").unwrap(), 1);
        assert!(store.month_records("carol", "2024-01").unwrap().is_empty());
    }

    #[test]
    fn test_append_assigns_timestamp_and_id() {
        let store = SqliteStore::open_in_memory().unwrap();

        let id1 = store.append("alice", "2024-01", &expense(1.0, "a", "2024-01-01")).unwrap();
        let id2 = store.append("alice", "2024-01", &expense(1.0, "a", "2024-01-01")).unwrap();
        assert_ne!(id1, id2);

        let records = store.month_records("alice", "2024-01").unwrap();
        assert_eq!(records.len(), 2, "identical transactions are both kept");
        assert!(records.iter().all(|r| r.timestamp.is_some()));
        assert_eq!(records[0].kind.as_deref(), Some("expense"));
    }

    #[test]
    fn test_legacy_documents_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let legacy = RawRecord {
            kind: Some("expenses".to_string()),
            amount: Some(12.0),
            category: None,
            date: None,
            timestamp: None,
        };

        store.append_document("alice", "2024-01", &legacy).unwrap();
        let records = store.month_records("alice", "2024-01").unwrap();
        assert_eq!(records, vec![legacy]);
    }

    #[test]
    fn test_analysis_last_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_analysis("alice", "2024-01").unwrap().is_none());

        store.save_analysis(&analytics("alice", "2024-01", vec![1.0])).unwrap();
        store.save_analysis(&analytics("alice", "2024-01", vec![2.0, 3.0])).unwrap();

        let saved = store.load_analysis("alice", "2024-01").unwrap().unwrap();
        assert_eq!(saved.anomalies, vec![2.0, 3.0]);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ezmoney.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.append("alice", "2024-01", &expense(5.0, "food", "2024-01-02")).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count_records("alice").unwrap(), 1);
    }
}
