// Expense Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod config;
pub mod store;
pub mod windowing;     // Bucket boundaries (day / ISO week / month)
pub mod aggregation;   // Totals per bucket
pub mod budget;        // Prioritized budget breach check
pub mod anomaly;       // Isolation forest over past amounts
pub mod validation;    // Entry-point input checks
pub mod pipeline;      // Submission orchestration
pub mod import;        // CSV history import

// Re-export commonly used types
pub use error::{Result, TrackerError};
pub use config::{AppConfig, AnomalySettings, BudgetThresholds};
pub use store::{Expense, ExpenseStore, Event, SqliteStore, setup_database};
pub use windowing::{TimeWindows, compute_boundaries};
pub use aggregation::{Totals, compute_totals};
pub use budget::{BudgetStatus, evaluate};
pub use anomaly::{AnomalyDetector, AnomalyVerdict, IsolationForest};
pub use validation::{Submission, parse_submission, validate_submission};
pub use pipeline::{DashboardView, SubmissionOutcome, SubmissionPipeline, ANOMALY_NOTICE};
pub use import::{ImportReport, import_csv};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
