//! The "sorts before" relation shared by page ordering and the rank locator.
//!
//! For ascending partitions a record precedes the target when it starts
//! earlier, for descending ones when it starts later. Equal starts fall back
//! to name ascending in both directions, matching the `ORDER BY` each
//! partition uses.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::partition::SortDirection;

/// The fields a partition sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankKey<'a> {
    pub start: DateTime<Utc>,
    pub name: &'a str,
}

impl<'a> RankKey<'a> {
    pub fn new(start: DateTime<Utc>, name: &'a str) -> Self {
        Self { start, name }
    }
}

pub fn compare(direction: SortDirection, a: &RankKey<'_>, b: &RankKey<'_>) -> Ordering {
    let by_start = match direction {
        SortDirection::Ascending => a.start.cmp(&b.start),
        SortDirection::Descending => b.start.cmp(&a.start),
    };
    by_start.then_with(|| a.name.cmp(b.name))
}

pub fn sorts_before(direction: SortDirection, candidate: &RankKey<'_>, target: &RankKey<'_>) -> bool {
    compare(direction, candidate, target) == Ordering::Less
}

/// SQL form of [`sorts_before`] over the `m` alias. Binds, in order:
/// target start, target start, target name.
pub fn sql_before_clause(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => {
            "(m.start_date_and_time < ? OR (m.start_date_and_time = ? AND m.name < ?))"
        }
        SortDirection::Descending => {
            "(m.start_date_and_time > ? OR (m.start_date_and_time = ? AND m.name < ?))"
        }
    }
}

/// Counts the keys that sort strictly before `target`.
pub fn rank_before<'a, I>(direction: SortDirection, keys: I, target: &RankKey<'_>) -> u64
where
    I: IntoIterator<Item = RankKey<'a>>,
{
    keys.into_iter()
        .filter(|key| sorts_before(direction, key, target))
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn ascending_orders_earlier_first() {
        let early = RankKey::new(at(8), "b");
        let late = RankKey::new(at(9), "a");
        assert!(sorts_before(SortDirection::Ascending, &early, &late));
        assert!(!sorts_before(SortDirection::Ascending, &late, &early));
    }

    #[test]
    fn descending_orders_later_first() {
        let early = RankKey::new(at(8), "a");
        let late = RankKey::new(at(9), "b");
        assert!(sorts_before(SortDirection::Descending, &late, &early));
        assert!(!sorts_before(SortDirection::Descending, &early, &late));
    }

    #[test]
    fn ties_break_on_name_ascending_in_both_directions() {
        let alpha = RankKey::new(at(8), "alpha");
        let beta = RankKey::new(at(8), "beta");
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            assert!(sorts_before(direction, &alpha, &beta));
            assert!(!sorts_before(direction, &beta, &alpha));
        }
    }

    #[test]
    fn a_record_never_sorts_before_itself() {
        let key = RankKey::new(at(8), "same");
        assert!(!sorts_before(SortDirection::Ascending, &key, &key));
        assert!(!sorts_before(SortDirection::Descending, &key, &key));
    }

    #[test]
    fn fifth_of_five_has_four_before_it() {
        let names = ["a", "b", "c", "d", "e"];
        let keys: Vec<RankKey<'_>> = names
            .iter()
            .enumerate()
            .map(|(i, name)| RankKey::new(at(10 + i as u32), name))
            .collect();

        let rank = rank_before(SortDirection::Ascending, keys.iter().copied(), &keys[4]);
        assert_eq!(rank, 4);
        assert_eq!(crate::temporal::page_for_rank(rank, 2), 3);
    }

    #[test]
    fn rank_agrees_with_sorted_position() {
        let names = ["m", "c", "x", "a", "k", "q"];
        let hours = [9, 11, 9, 14, 11, 7];
        let keys: Vec<RankKey<'_>> = names
            .iter()
            .zip(hours)
            .map(|(name, hour)| RankKey::new(at(hour), name))
            .collect();

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let mut sorted = keys.clone();
            sorted.sort_by(|a, b| compare(direction, a, b));
            for (position, key) in sorted.iter().enumerate() {
                assert_eq!(
                    rank_before(direction, keys.iter().copied(), key),
                    position as u64
                );
            }
        }
    }
}
