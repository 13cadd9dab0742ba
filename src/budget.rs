// 💰 Budget Evaluator - Prioritized Breach Check
// Daily first, then weekly, then monthly. First breach wins.

use crate::aggregation::Totals;
use crate::config::BudgetThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier was breached, carrying the threshold that was exceeded.
///
/// `Display` renders thresholds with the shortest float form, so a
/// 250.0 budget reads "exceeded daily budget of 250".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "threshold", rename_all = "snake_case")]
pub enum BudgetStatus {
    DailyExceeded(f64),
    WeeklyExceeded(f64),
    MonthlyExceeded(f64),
    WithinBudgets,
}

impl BudgetStatus {
    pub fn is_breach(&self) -> bool {
        !matches!(self, BudgetStatus::WithinBudgets)
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetStatus::DailyExceeded(limit) => write!(f, "exceeded daily budget of {}", limit),
            BudgetStatus::WeeklyExceeded(limit) => write!(f, "exceeded weekly budget of {}", limit),
            BudgetStatus::MonthlyExceeded(limit) => {
                write!(f, "exceeded monthly budget of {}", limit)
            }
            BudgetStatus::WithinBudgets => write!(f, "within all budgets"),
        }
    }
}

/// Classify totals against thresholds. Equal to a threshold is not a breach.
pub fn evaluate(totals: &Totals, thresholds: &BudgetThresholds) -> BudgetStatus {
    if totals.daily > thresholds.daily {
        BudgetStatus::DailyExceeded(thresholds.daily)
    } else if totals.weekly > thresholds.weekly {
        BudgetStatus::WeeklyExceeded(thresholds.weekly)
    } else if totals.monthly > thresholds.monthly {
        BudgetStatus::MonthlyExceeded(thresholds.monthly)
    } else {
        BudgetStatus::WithinBudgets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(daily: f64, weekly: f64, monthly: f64) -> Totals {
        Totals {
            daily,
            weekly,
            monthly,
        }
    }

    #[test]
    fn test_daily_short_circuits() {
        let status = evaluate(&totals(300.0, 300.0, 300.0), &BudgetThresholds::default());

        assert_eq!(status, BudgetStatus::DailyExceeded(250.0));
        assert_eq!(status.to_string(), "exceeded daily budget of 250");
    }

    #[test]
    fn test_daily_wins_over_all_other_breaches() {
        let status = evaluate(&totals(251.0, 2000.0, 9000.0), &BudgetThresholds::default());
        assert_eq!(status, BudgetStatus::DailyExceeded(250.0));
    }

    #[test]
    fn test_weekly_then_monthly() {
        let thresholds = BudgetThresholds::default();

        let weekly = evaluate(&totals(100.0, 1800.0, 9000.0), &thresholds);
        assert_eq!(weekly.to_string(), "exceeded weekly budget of 1750");

        let monthly = evaluate(&totals(100.0, 1000.0, 8000.5), &thresholds);
        assert_eq!(monthly.to_string(), "exceeded monthly budget of 8000");
    }

    #[test]
    fn test_equal_to_threshold_is_not_a_breach() {
        let status = evaluate(&totals(250.0, 1750.0, 8000.0), &BudgetThresholds::default());

        assert_eq!(status, BudgetStatus::WithinBudgets);
        assert!(!status.is_breach());
        assert_eq!(status.to_string(), "within all budgets");
    }

    #[test]
    fn test_custom_thresholds_in_message() {
        let thresholds = BudgetThresholds {
            daily: 42.5,
            weekly: 100.0,
            monthly: 400.0,
        };
        let status = evaluate(&totals(50.0, 50.0, 50.0), &thresholds);

        assert_eq!(status.to_string(), "exceeded daily budget of 42.5");
    }
}
