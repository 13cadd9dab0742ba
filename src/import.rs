// 📥 CSV Import - seed history from a spreadsheet export
//
// Columns: amount, description, created_at (RFC 3339, optional).
// Rows are validated like form input but skip the pipeline: importing
// history should not produce budget or anomaly messages.

use crate::store::{Expense, ExpenseStore};
use crate::validation::validate_submission;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ImportRow {
    amount: f64,
    description: String,
    #[serde(default)]
    created_at: Option<String>,
}

/// Result of one import run
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Expense>,
    /// (line number, reason)
    pub rejected: Vec<(usize, String)>,
}

pub fn import_csv<S: ExpenseStore>(store: &S, csv_path: &Path) -> Result<ImportReport> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;
    import_from_reader(store, file, Utc::now())
}

/// Import from any reader; rows without `created_at` are stamped with `default_time`
pub fn import_from_reader<S: ExpenseStore, R: Read>(
    store: &S,
    reader: R,
    default_time: DateTime<Utc>,
) -> Result<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut report = ImportReport::default();

    for (index, result) in rdr.deserialize::<ImportRow>().enumerate() {
        // Header is line 1
        let line = index + 2;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(line, error = %e, "skipping unreadable CSV row");
                report.rejected.push((line, e.to_string()));
                continue;
            }
        };

        let submission = match validate_submission(row.amount, &row.description) {
            Ok(submission) => submission,
            Err(e) => {
                report.rejected.push((line, e.to_string()));
                continue;
            }
        };

        let created_at = match row.created_at.as_deref().filter(|s| !s.is_empty()) {
            None => default_time,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(e) => {
                    report
                        .rejected
                        .push((line, format!("bad created_at {:?}: {}", raw, e)));
                    continue;
                }
            },
        };

        let expense = store
            .insert(submission.amount, &submission.description, created_at)
            .with_context(|| format!("Failed to store CSV line {}", line))?;
        report.imported.push(expense);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use chrono::TimeZone;

    #[test]
    fn test_import_with_and_without_timestamps() {
        let store = SqliteStore::open_in_memory().unwrap();
        let default_time = Utc.with_ymd_and_hms(2024, 5, 16, 12, 0, 0).unwrap();
        let csv = "amount,description,created_at\n\
                   12.5,Lunch,2024-05-01T12:00:00Z\n\
                   3.25,Coffee,\n";

        let report = import_from_reader(&store, csv.as_bytes(), default_time).unwrap();

        assert_eq!(report.imported.len(), 2);
        assert!(report.rejected.is_empty());
        assert_eq!(
            report.imported[0].created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(report.imported[1].created_at, default_time);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_invalid_rows_are_reported_not_stored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let csv = "amount,description,created_at\n\
                   -4,Refund,\n\
                   abc,Mystery,\n\
                   8,   ,\n\
                   9,Cinema,yesterday\n\
                   15,Books,\n";

        let report = import_from_reader(&store, csv.as_bytes(), Utc::now()).unwrap();

        let lines: Vec<usize> = report.rejected.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5]);
        assert_eq!(report.imported.len(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
