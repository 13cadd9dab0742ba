// 📊 Aggregation Engine - Bucket Totals
// One range query per bucket, summed independently

use crate::error::Result;
use crate::store::Expense;
use crate::windowing::TimeWindows;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Spend per bucket
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

/// Sum amounts for each bucket.
///
/// `query_since(ts)` must return every record with `created_at >= ts`.
/// Any query failure is returned as-is and no totals are produced.
pub fn compute_totals<F>(windows: &TimeWindows, mut query_since: F) -> Result<Totals>
where
    F: FnMut(DateTime<Utc>) -> Result<Vec<Expense>>,
{
    let daily = sum_amounts(&query_since(windows.day_start_utc())?);
    let weekly = sum_amounts(&query_since(windows.week_start_utc())?);
    let monthly = sum_amounts(&query_since(windows.month_start_utc())?);

    let totals = Totals {
        daily,
        weekly,
        monthly,
    };
    debug!(?totals, "computed bucket totals");

    Ok(totals)
}

pub fn sum_amounts(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::windowing::compute_boundaries;
    use chrono::{FixedOffset, TimeZone};

    fn expense(id: i64, amount: f64, created_at: DateTime<Utc>) -> Expense {
        Expense {
            id,
            amount,
            description: format!("expense {}", id),
            created_at,
        }
    }

    fn windows() -> TimeWindows {
        // Thursday 2024-05-16, 18:00 UTC
        let reference = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 16, 18, 0, 0)
            .unwrap();
        compute_boundaries(reference)
    }

    #[test]
    fn test_empty_record_set_sums_to_zero() {
        let totals = compute_totals(&windows(), |_| Ok(Vec::new())).unwrap();

        assert_eq!(totals.daily, 0.0);
        assert_eq!(totals.weekly, 0.0);
        assert_eq!(totals.monthly, 0.0);
    }

    #[test]
    fn test_each_bucket_filters_independently() {
        let records = vec![
            expense(1, 10.0, Utc.with_ymd_and_hms(2024, 5, 16, 9, 0, 0).unwrap()), // today
            expense(2, 20.0, Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).unwrap()), // this week
            expense(3, 40.0, Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()),  // this month
            expense(4, 80.0, Utc.with_ymd_and_hms(2024, 4, 30, 9, 0, 0).unwrap()), // last month
        ];

        let mut calls = Vec::new();
        let totals = compute_totals(&windows(), |since| {
            calls.push(since);
            Ok(records
                .iter()
                .filter(|e| e.created_at >= since)
                .cloned()
                .collect())
        })
        .unwrap();

        assert_eq!(totals.daily, 10.0);
        assert_eq!(totals.weekly, 30.0);
        assert_eq!(totals.monthly, 70.0);
        assert_eq!(calls.len(), 3, "one query per bucket");
    }

    #[test]
    fn test_query_failure_propagates() {
        let result = compute_totals(&windows(), |_| {
            Err(TrackerError::Storage(rusqlite::Error::InvalidQuery))
        });

        assert!(matches!(result, Err(TrackerError::Storage(_))));
    }
}
