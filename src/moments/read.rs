//! The read contract: one page per partition, grouped by calendar day.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use super::{
    capture_now,
    editor::StepSequenceEditor,
    query::{ViewQuery, ViewSelector},
    MomentsService,
};
use crate::{
    db::{models::Moment, MomentFilter},
    log_debug, log_warn,
    temporal::{Page, PageWindow, Partition},
};

const ENABLE_LOGS: bool = true;

/// Moments of one page that share a local calendar day, in page order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    pub date: NaiveDate,
    pub moment_ids: Vec<String>,
}

/// Groups consecutive moments by the local date of their start. The input
/// order is kept, so a descending page yields descending days.
pub fn group_by_day(moments: &[Moment], offset: FixedOffset) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for moment in moments {
        let date = moment
            .start_date_and_time
            .with_timezone(&offset)
            .date_naive();
        match groups.last_mut() {
            Some(group) if group.date == date => group.moment_ids.push(moment.id.clone()),
            _ => groups.push(DayGroup {
                date,
                moment_ids: vec![moment.id.clone()],
            }),
        }
    }
    groups
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionPage {
    pub partition: Partition,
    #[serde(flatten)]
    pub page: Page<Moment>,
    pub days: Vec<DayGroup>,
}

/// All four partitions rendered against the same `now`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentsView {
    pub now: DateTime<Utc>,
    pub search: String,
    pub all: PartitionPage,
    pub past: PartitionPage,
    pub current: PartitionPage,
    pub future: PartitionPage,
}

impl MomentsView {
    pub fn partition(&self, partition: Partition) -> &PartitionPage {
        match partition {
            Partition::All => &self.all,
            Partition::Past => &self.past,
            Partition::Current => &self.current,
            Partition::Future => &self.future,
        }
    }

    /// `count(past) + count(current) + count(future)`, which equals
    /// `all.total_count` for well-formed moments.
    pub fn classified_total(&self) -> u64 {
        self.past.page.total_count + self.current.page.total_count + self.future.page.total_count
    }
}

/// What the presentation layer should show for a query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub view: ViewSelector,
    pub active_partition: Partition,
    pub moments: MomentsView,
    /// The moment opened for editing, only in the update view.
    pub editing: Option<Moment>,
}

impl ViewState {
    /// A fresh editor for the current view: seeded from the edited moment,
    /// empty for the create view.
    pub fn editor(&self) -> Option<StepSequenceEditor> {
        match (self.view, &self.editing) {
            (ViewSelector::Update, Some(moment)) => Some(StepSequenceEditor::from_moment(moment)),
            (ViewSelector::Create, _) => Some(StepSequenceEditor::new(self.moments.now)),
            _ => None,
        }
    }
}

impl MomentsService {
    /// One page of `partition`: count first, clamp the requested page, then
    /// fetch the slice.
    pub async fn partition_page(
        &self,
        user_id: &str,
        partition: Partition,
        search: &str,
        requested_page: u32,
        now: DateTime<Utc>,
    ) -> Result<PartitionPage> {
        let filter = MomentFilter::new(user_id, partition, now).with_search(search);

        let total_count = self.db().count_moments(&filter).await?;
        let window = PageWindow::new(total_count, requested_page, self.page_size());
        let items = self
            .db()
            .find_moments(&filter, window.offset, window.page_size)
            .await?;

        if window.current_page != requested_page {
            log_debug!(
                "Clamped {partition} page {requested_page} to {} of {}",
                window.current_page,
                window.total_pages
            );
        }

        let days = group_by_day(&items, self.day_offset());
        Ok(PartitionPage {
            partition,
            page: Page::from_window(window, total_count, items),
            days,
        })
    }

    /// Renders the four partitions against a single `now` captured here.
    pub async fn read_moments(&self, user_id: &str, query: &ViewQuery) -> Result<MomentsView> {
        self.read_moments_at(user_id, query, capture_now()).await
    }

    pub async fn read_moments_at(
        &self,
        user_id: &str,
        query: &ViewQuery,
        now: DateTime<Utc>,
    ) -> Result<MomentsView> {
        let search = query.search.as_str();
        let pages = query.pages;

        let (all, past, current, future) = tokio::try_join!(
            self.partition_page(user_id, Partition::All, search, pages.all, now),
            self.partition_page(user_id, Partition::Past, search, pages.past, now),
            self.partition_page(user_id, Partition::Current, search, pages.current, now),
            self.partition_page(user_id, Partition::Future, search, pages.future, now),
        )?;

        Ok(MomentsView {
            now,
            search: query.search.clone(),
            all,
            past,
            current,
            future,
        })
    }

    /// Resolves query parameters into a view. An update request for a moment
    /// that cannot be found falls back to the read view.
    pub async fn resolve_view(&self, user_id: &str, query: &ViewQuery) -> Result<ViewState> {
        let moments = self.read_moments(user_id, query).await?;

        let (view, editing) = match (query.view, query.moment_id.as_deref()) {
            (ViewSelector::Update, Some(moment_id)) => {
                match self.db().get_moment(user_id, moment_id).await? {
                    Some(moment) => (ViewSelector::Update, Some(moment)),
                    None => {
                        log_warn!("Moment {moment_id} not found for user {user_id}, showing read view");
                        (ViewSelector::Read, None)
                    }
                }
            }
            (ViewSelector::Update, None) => {
                log_warn!("Update view requested without a moment id, showing read view");
                (ViewSelector::Read, None)
            }
            (view, _) => (view, None),
        };

        Ok(ViewState {
            view,
            active_partition: query.partition,
            moments,
            editing,
        })
    }
}
