//! Temporal partitions of moments relative to a reference instant.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MomentsError;

/// The four lenses a user can browse moments through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Partition {
    All,
    Past,
    Current,
    Future,
}

/// Where a single moment falls relative to `now`. Unlike [`Partition`] there
/// is no `All`: every moment is exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemporalClass {
    Past,
    Current,
    Future,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// SQL rendition of a partition condition over the `m` (moments) alias.
/// Every `?` placeholder binds the request's `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlPredicate {
    pub clause: &'static str,
    pub now_bindings: usize,
}

impl TemporalClass {
    /// `past` iff `end < now`, `future` iff `start > now`, otherwise
    /// `current` (`start <= now <= end`).
    ///
    /// A malformed moment with `start > end` that straddles `now` reports
    /// `Past`, since its end is already behind.
    pub fn classify(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if end < now {
            TemporalClass::Past
        } else if start > now {
            TemporalClass::Future
        } else {
            TemporalClass::Current
        }
    }

    pub fn partition(self) -> Partition {
        match self {
            TemporalClass::Past => Partition::Past,
            TemporalClass::Current => Partition::Current,
            TemporalClass::Future => Partition::Future,
        }
    }
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::All,
        Partition::Past,
        Partition::Current,
        Partition::Future,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::All => "all",
            Partition::Past => "past",
            Partition::Current => "current",
            Partition::Future => "future",
        }
    }

    /// Past and all read newest first; current and future read soonest first.
    pub fn direction(&self) -> SortDirection {
        match self {
            Partition::All | Partition::Past => SortDirection::Descending,
            Partition::Current | Partition::Future => SortDirection::Ascending,
        }
    }

    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Partition::All => true,
            _ => TemporalClass::classify(start, end, now).partition() == *self,
        }
    }

    pub fn sql_predicate(&self) -> Option<SqlPredicate> {
        match self {
            Partition::All => None,
            Partition::Past => Some(SqlPredicate {
                clause: "m.end_date_and_time < ?",
                now_bindings: 1,
            }),
            Partition::Current => Some(SqlPredicate {
                clause: "(m.start_date_and_time <= ? AND m.end_date_and_time >= ?)",
                now_bindings: 2,
            }),
            Partition::Future => Some(SqlPredicate {
                clause: "m.start_date_and_time > ?",
                now_bindings: 1,
            }),
        }
    }

    pub fn sql_order_by(&self) -> &'static str {
        match self.direction() {
            SortDirection::Ascending => "m.start_date_and_time ASC, m.name ASC",
            SortDirection::Descending => "m.start_date_and_time DESC, m.name ASC",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = MomentsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "all" => Ok(Partition::All),
            "past" => Ok(Partition::Past),
            "current" => Ok(Partition::Current),
            "future" => Ok(Partition::Future),
            other => Err(MomentsError::UnknownPartition(other.to_string())),
        }
    }
}
