pub mod calculator;
pub mod pagination;
pub mod partition;
pub mod rank;

pub use calculator::{derive_schedule, is_storable, DerivedSchedule, StepInterval};
pub use pagination::{page_for_rank, total_pages, Page, PageWindow};
pub use partition::{Partition, SortDirection, SqlPredicate, TemporalClass};
pub use rank::{compare, rank_before, sorts_before, RankKey};
