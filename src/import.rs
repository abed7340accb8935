// 📥 CSV Import
// Loads a user's ledger from CSV (type,amount,category,date) through the
// same validation as the HTTP ingest path

use crate::error::AppResult;
use crate::models::Transaction;
use crate::service::FinanceService;
use serde::Deserialize;
use std::io::Read;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    amount: String,
    category: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub inserted: usize,
    /// (line number, reason) for every row that failed validation
    pub rejected: Vec<(u64, String)>,
    /// Anomalies over the user's full history after the import
    pub anomalies: Vec<f64>,
}

/// Bad rows are reported and skipped; store failures abort the import.
/// The anomaly scan runs once at the end rather than per row.
pub fn import_csv<R: Read>(
    service: &FinanceService,
    user_id: &str,
    reader: R,
) -> AppResult<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut report = ImportReport::default();

    for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = index as u64 + 2;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                reject(&mut report, line, e.to_string());
                continue;
            }
        };

        let tx = match parse_row(&row) {
            Ok(tx) => tx,
            Err(reason) => {
                reject(&mut report, line, reason);
                continue;
            }
        };

        service.store().append(user_id, &tx.month(), &tx)?;
        report.inserted += 1;
    }

    report.anomalies = service.user_anomalies(user_id)?;
    Ok(report)
}

fn reject(report: &mut ImportReport, line: u64, reason: String) {
    warn!(line, reason = %reason, "row rejected");
    report.rejected.push((line, reason));
}

fn parse_row(row: &CsvRow) -> Result<Transaction, String> {
    let amount: f64 = row
        .amount
        .parse()
        .map_err(|_| format!("Invalid amount: {}", row.amount))?;
    let date = row.date.as_deref().filter(|d| !d.is_empty());

    Transaction::new(&row.kind, amount, &row.category, date).map_err(|e| e.to_string())
}
