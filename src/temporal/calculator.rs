//! Derived start/end times for a moment and its steps.
//!
//! The authoritative write path and the live editor preview both run this
//! single function, so a stored schedule and a previewed one can never drift.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use crate::error::MomentsError;

/// Start and end of one step inside a moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSchedule {
    pub steps: Vec<StepInterval>,
    pub moment_end: DateTime<Utc>,
    /// Sum of all step durations, in minutes.
    pub moment_duration: u32,
}

impl DerivedSchedule {
    pub fn step(&self, index: usize) -> Option<&StepInterval> {
        self.steps.get(index)
    }
}

/// Whether `value` keeps the four-digit-year text form timestamps are stored
/// in. Outside years 1..=9999 the text neither parses back nor sorts.
pub fn is_storable(value: DateTime<Utc>) -> bool {
    (1..=9999).contains(&value.year())
}

/// Lays the steps end to end starting at `moment_start`.
///
/// Durations are whole minutes. Bounds (5..=1440 per step) are a validation
/// concern; this function accepts any value it is given, but refuses a
/// schedule with an instant outside the storable range.
pub fn derive_schedule<I>(
    moment_start: DateTime<Utc>,
    durations: I,
) -> Result<DerivedSchedule, MomentsError>
where
    I: IntoIterator<Item = u32>,
{
    let out_of_range = || MomentsError::ScheduleOutOfRange {
        start: moment_start,
    };
    let offset = |minutes: i64| {
        moment_start
            .checked_add_signed(Duration::minutes(minutes))
            .filter(|instant| is_storable(*instant))
            .ok_or_else(out_of_range)
    };

    if !is_storable(moment_start) {
        return Err(out_of_range());
    }

    let mut cumulative_minutes: i64 = 0;
    let mut steps = Vec::new();
    for duration in durations {
        let start = offset(cumulative_minutes)?;
        cumulative_minutes += i64::from(duration);
        steps.push(StepInterval {
            start,
            end: offset(cumulative_minutes)?,
        });
    }

    Ok(DerivedSchedule {
        steps,
        moment_end: offset(cumulative_minutes)?,
        moment_duration: u32::try_from(cumulative_minutes).map_err(|_| out_of_range())?,
    })
}
