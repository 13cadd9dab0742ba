// 🗓️ Time Windowing - Bucket Boundaries
// Start of day / ISO week / calendar month for a reference instant
//
// All boundaries are midnight in the reference instant's own offset.
// Week and month are computed independently: when a week straddles a
// month boundary, week_start precedes month_start.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive lower bounds of the three spend buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindows {
    pub day_start: DateTime<FixedOffset>,
    pub week_start: DateTime<FixedOffset>,
    pub month_start: DateTime<FixedOffset>,
}

impl TimeWindows {
    pub fn day_start_utc(&self) -> DateTime<Utc> {
        self.day_start.with_timezone(&Utc)
    }

    pub fn week_start_utc(&self) -> DateTime<Utc> {
        self.week_start.with_timezone(&Utc)
    }

    pub fn month_start_utc(&self) -> DateTime<Utc> {
        self.month_start.with_timezone(&Utc)
    }
}

/// Compute the day/week/month boundaries for `reference`
pub fn compute_boundaries(reference: DateTime<FixedOffset>) -> TimeWindows {
    let offset = *reference.offset();
    let date = reference.date_naive();

    let week_date = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let month_date = date - Duration::days(i64::from(date.day0()));

    TimeWindows {
        day_start: midnight(date, offset),
        week_start: midnight(week_date, offset),
        month_start: midnight(month_date, offset),
    }
}

/// Current instant expressed in the given reference timezone
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

fn midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

// ============================================================================
// TESTS
// ============================================================================
