use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Step, StepRecord};
use crate::temporal::{Partition, RankKey, TemporalClass};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Moment {
    pub id: String,
    pub user_id: String,
    pub destination_id: String,
    pub destination_name: String,
    pub activity: String,
    pub name: String,
    pub is_indispensable: bool,
    pub description: String,
    pub start_date_and_time: DateTime<Utc>,
    /// Minutes; sum of the step durations at write time.
    pub duration: u32,
    pub end_date_and_time: DateTime<Utc>,
    /// Ordered by `order_id`.
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Moment {
    pub fn rank_key(&self) -> RankKey<'_> {
        RankKey::new(self.start_date_and_time, &self.name)
    }

    pub fn classify(&self, now: DateTime<Utc>) -> TemporalClass {
        TemporalClass::classify(self.start_date_and_time, self.end_date_and_time, now)
    }

    pub fn is_in(&self, partition: Partition, now: DateTime<Utc>) -> bool {
        partition.contains(self.start_date_and_time, self.end_date_and_time, now)
    }

    /// Case-sensitive substring match; an empty term matches everything.
    pub fn matches_search(&self, search: &str) -> bool {
        search.is_empty() || self.name.contains(search)
    }
}

/// A moment about to be created or overwritten. Derived fields are always
/// computed by the write service, never copied from the caller.
#[derive(Debug, Clone)]
pub struct MomentRecord {
    pub id: String,
    pub user_id: String,
    pub destination_name: String,
    pub activity: String,
    pub name: String,
    pub is_indispensable: bool,
    pub description: String,
    pub start_date_and_time: DateTime<Utc>,
    pub duration: u32,
    pub end_date_and_time: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
}
