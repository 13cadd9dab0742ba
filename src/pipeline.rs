// 🔁 Submission Pipeline
// persist → boundaries → totals → budget status → anomaly check → message
//
// Store and config are injected; nothing here is process-global.

use crate::aggregation::{compute_totals, Totals};
use crate::anomaly::{AnomalyDetector, AnomalyVerdict};
use crate::budget::{evaluate, BudgetStatus};
use crate::config::{AppConfig, BudgetThresholds};
use crate::error::Result;
use crate::store::{Expense, ExpenseStore};
use crate::windowing::{compute_boundaries, now_in};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Appended (never substituted) to the budget message for outliers
pub const ANOMALY_NOTICE: &str = "unusual entry compared to your past spending";

/// Everything produced by one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub expense: Expense,
    pub totals: Totals,
    pub budget: BudgetStatus,
    pub anomaly: AnomalyVerdict,
    pub message: String,
}

/// View model handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub expenses: Vec<Expense>,
    pub daily_total: f64,
    pub weekly_total: f64,
    pub monthly_total: f64,
    pub thresholds: BudgetThresholds,
    pub message: Option<String>,
}

pub struct SubmissionPipeline<S: ExpenseStore> {
    store: S,
    config: AppConfig,
    timezone: FixedOffset,
    detector: AnomalyDetector,
}

impl<S: ExpenseStore> SubmissionPipeline<S> {
    pub fn new(store: S, config: AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let timezone = config.timezone()?;
        let detector = AnomalyDetector::new(config.anomaly);

        Ok(SubmissionPipeline {
            store,
            config,
            timezone,
            detector,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle a validated submission at the current instant
    pub fn handle_submission(&self, amount: f64, description: &str) -> Result<SubmissionOutcome> {
        self.handle_submission_at(amount, description, now_in(self.timezone))
    }

    /// Handle a validated submission as if it happened at `now`
    pub fn handle_submission_at(
        &self,
        amount: f64,
        description: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<SubmissionOutcome> {
        // 1. Persist: the new entry counts toward its own buckets and the training set
        let expense = self
            .store
            .insert(amount, description, now.with_timezone(&Utc))?;

        // 2-3. Boundaries and post-insert totals
        let totals = self.totals_at(now)?;

        // 4. Budget status
        let budget = evaluate(&totals, &self.config.budgets);
        if budget.is_breach() {
            warn!(%budget, ?totals, "budget breached");
        }

        // 5. Anomaly check over every stored amount, new one included
        let history: Vec<f64> = self
            .store
            .query_all()?
            .iter()
            .map(|e| e.amount)
            .collect();
        let anomaly = self.detector.assess(&history, amount);

        // 6. Combine
        let mut message = budget.to_string();
        if anomaly.is_anomalous() {
            message.push_str("  ");
            message.push_str(ANOMALY_NOTICE);
        }

        info!(
            id = expense.id,
            amount,
            anomalous = anomaly.is_anomalous(),
            "submission handled"
        );

        Ok(SubmissionOutcome {
            expense,
            totals,
            budget,
            anomaly,
            message,
        })
    }

    /// Bucket totals as of `now`
    pub fn totals_at(&self, now: DateTime<FixedOffset>) -> Result<Totals> {
        let windows = compute_boundaries(now);
        compute_totals(&windows, |since| self.store.query_since(since))
    }

    /// Fresh view model at the current instant
    pub fn dashboard(&self, message: Option<String>) -> Result<DashboardView> {
        self.dashboard_at(message, now_in(self.timezone))
    }

    pub fn dashboard_at(
        &self,
        message: Option<String>,
        now: DateTime<FixedOffset>,
    ) -> Result<DashboardView> {
        let totals = self.totals_at(now)?;
        let expenses = self.store.query_all()?;

        Ok(DashboardView {
            expenses,
            daily_total: totals.daily,
            weekly_total: totals.weekly,
            monthly_total: totals.monthly,
            thresholds: self.config.budgets,
            message,
        })
    }

    /// Delete one expense; `NotFound` passes through to the caller
    pub fn delete_expense(&self, id: i64) -> Result<()> {
        self.store.delete_by_id(id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
