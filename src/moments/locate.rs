//! Which page a given moment sits on, without scanning the partition.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::MomentsService;
use crate::{
    db::{models::Moment, MomentFilter},
    temporal::{page_for_rank, Partition},
};

/// Where a freshly written moment can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// The moment's own temporal partition (never `all`).
    pub partition: Partition,
    pub page: u32,
    /// Page inside the `all` partition.
    pub all_page: u32,
}

impl MomentsService {
    /// Page of `target` within `partition` under the same search filter the
    /// listing uses, or `None` when the target is not listed there at all.
    pub async fn locate_page(
        &self,
        user_id: &str,
        target: &Moment,
        partition: Partition,
        search: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>> {
        if !target.is_in(partition, now) || !target.matches_search(search) {
            return Ok(None);
        }

        let filter = MomentFilter::new(user_id, partition, now).with_search(search);
        let rank_before = self
            .db()
            .count_sorted_before(&filter, target.start_date_and_time, &target.name)
            .await?;

        Ok(Some(page_for_rank(rank_before, self.page_size())))
    }

    /// Unfiltered location of `target` in its own partition and in `all`.
    pub async fn placement(
        &self,
        user_id: &str,
        target: &Moment,
        now: DateTime<Utc>,
    ) -> Result<Placement> {
        let partition = target.classify(now).partition();
        let (page, all_page) = tokio::try_join!(
            self.locate_page(user_id, target, partition, "", now),
            self.locate_page(user_id, target, Partition::All, "", now),
        )?;

        Ok(Placement {
            partition,
            page: page.unwrap_or(1),
            all_page: all_page.unwrap_or(1),
        })
    }
}
