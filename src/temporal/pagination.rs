use serde::Serialize;

/// Number of pages for `total_count` items; never less than one so an empty
/// partition still has a page to land on.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// 1-based page a record lands on when `rank_before` records sort ahead of it.
pub fn page_for_rank(rank_before: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    u32::try_from(rank_before / page_size + 1).unwrap_or(u32::MAX)
}

/// The slice of a filtered, sorted result set to fetch for a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub offset: u64,
}

impl PageWindow {
    /// Clamps `requested_page` into `[1, total_pages]`.
    pub fn new(total_count: u64, requested_page: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_pages(total_count, page_size);
        let current_page = requested_page.clamp(1, total_pages);

        Self {
            current_page,
            total_pages,
            page_size,
            offset: u64::from(current_page - 1) * u64::from(page_size),
        }
    }

    /// 1-based inclusive indexes of the returned slice inside the filtered
    /// total, `(0, 0)` when the slice is empty.
    pub fn bounds(&self, returned: usize) -> (u64, u64) {
        if returned == 0 {
            (0, 0)
        } else {
            (self.offset + 1, self.offset + returned as u64)
        }
    }
}

/// One page of a partition, ready for a "showing X–Y of Z" display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub first_index: u64,
    pub last_index: u64,
}

impl<T> Page<T> {
    pub fn from_window(window: PageWindow, total_count: u64, items: Vec<T>) -> Self {
        let (first_index, last_index) = window.bounds(items.len());
        Self {
            items,
            total_count,
            current_page: window.current_page,
            total_pages: window.total_pages,
            first_index,
            last_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_still_has_one_page() {
        assert_eq!(total_pages(0, 5), 1);
        let window = PageWindow::new(0, 4, 5);
        assert_eq!(window.current_page, 1);
        assert_eq!(window.offset, 0);
        assert_eq!(window.bounds(0), (0, 0));
    }

    #[test]
    fn rounds_partial_pages_up() {
        assert_eq!(total_pages(10, 5), 2);
        assert_eq!(total_pages(11, 5), 3);
        assert_eq!(total_pages(1, 5), 1);
    }

    #[test]
    fn clamps_requested_page() {
        assert_eq!(PageWindow::new(11, 0, 5).current_page, 1);
        assert_eq!(PageWindow::new(11, 99, 5).current_page, 3);
        assert_eq!(PageWindow::new(11, 2, 5).offset, 5);
    }

    #[test]
    fn last_page_bounds_are_partial() {
        let window = PageWindow::new(11, 3, 5);
        assert_eq!(window.offset, 10);
        assert_eq!(window.bounds(1), (11, 11));
    }

    #[test]
    fn returned_page_is_always_in_range() {
        for total in 0..40u64 {
            for requested in 0..12u32 {
                let window = PageWindow::new(total, requested, 4);
                assert!(window.current_page >= 1);
                assert!(window.current_page <= total_pages(total, 4));
            }
        }
    }

    #[test]
    fn rank_maps_to_page() {
        assert_eq!(page_for_rank(0, 2), 1);
        assert_eq!(page_for_rank(1, 2), 1);
        assert_eq!(page_for_rank(4, 2), 3);
    }

    #[test]
    fn zero_page_size_is_treated_as_one() {
        assert_eq!(total_pages(3, 0), 3);
        assert_eq!(PageWindow::new(3, 2, 0).offset, 1);
    }
}
