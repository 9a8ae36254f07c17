pub mod audit;
pub mod editor;
pub mod locate;
pub mod query;
pub mod read;
pub mod validation;
pub mod write;

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};

use crate::{db::Database, settings::AppConfig};

pub use audit::{audit, ensure_consistent, MomentAudit, MomentIssue};
pub use editor::{DraftStep, EditorState, Preview, PreviewRow, StepForm, StepSequenceEditor};
pub use locate::Placement;
pub use query::{PartitionPages, ViewQuery, ViewSelector};
pub use read::{group_by_day, DayGroup, MomentsView, PartitionPage, ViewState};
pub use validation::{ErrorGroup, ErrorGroupKind, ValidationFailure};
pub use write::{
    FailureKind, MomentFields, StepInput, WriteFailure, WriteOutcome, WriteRequest, WriteSuccess,
    WriteVariant,
};

/// Reference instant for one request, truncated to the millisecond precision
/// timestamps are stored with.
pub fn capture_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Read, write and audit services over a [`Database`]. Cheap to clone.
#[derive(Clone)]
pub struct MomentsService {
    db: Database,
    page_size: u32,
    day_offset: FixedOffset,
}

impl MomentsService {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        Self {
            db,
            page_size: config.page_size(),
            day_offset: config.day_offset(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn day_offset(&self) -> FixedOffset {
        self.day_offset
    }
}
