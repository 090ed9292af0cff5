//! Client-side pagination over a fully fetched result list.
//!
//! Everything here is a pure function of the result list, the page size and
//! the current page, so the page view can be recomputed after every change
//! without any chance of drifting from the result set.

use std::cmp::{max, min};

/// Results shown per page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Up to this many pages the navigation lists every page number
pub const MAX_VISIBLE_PAGES: usize = 7;

/// Counts at or above this are shown as "300+"
pub const RESULT_COUNT_CAP: u64 = 300;

/// One entry of the page navigation bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

impl PageItem {
    pub fn label(&self) -> String {
        match self {
            PageItem::Page(n) => n.to_string(),
            PageItem::Ellipsis => "...".to_string(),
        }
    }
}

/// Number of pages needed for `total` results, never less than one
pub fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    max(1, total.div_ceil(page_size))
}

/// The results visible on `page` (1-based).
///
/// Pages past the end, and page 0, yield an empty slice rather than an
/// error; callers that navigate must validate the page number first.
pub fn slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = match (page - 1).checked_mul(page_size) {
        Some(start) if start < items.len() => start,
        _ => return &[],
    };
    let end = min(start.saturating_add(page_size), items.len());
    &items[start..end]
}

/// Page numbers to offer in the navigation bar: first page, a window around
/// `current`, last page, with ellipses where pages are skipped.
pub fn page_window(current: usize, total_pages: usize) -> Vec<PageItem> {
    let total = max(1, total_pages);

    if total <= MAX_VISIBLE_PAGES {
        return (1..=total).map(PageItem::Page).collect();
    }

    let current = current.clamp(1, total);
    let mut items = vec![PageItem::Page(1)];

    if current > 3 {
        items.push(PageItem::Ellipsis);
    }

    let mut start = max(2, current.saturating_sub(1));
    let mut end = min(total - 1, current + 1);

    // Near the start keep five leading pages, near the end keep five
    // trailing ones
    if current <= 3 {
        end = min(5, total - 1);
    }
    if current >= total - 2 {
        start = max(2, total - 4);
    }

    items.extend((start..=end).map(PageItem::Page));

    if current < total - 2 {
        items.push(PageItem::Ellipsis);
    }

    items.push(PageItem::Page(total));
    items
}

/// Display form of the declared total, saturating at [`RESULT_COUNT_CAP`]
pub fn format_result_count(total: u64) -> String {
    format_result_count_with_cap(total, RESULT_COUNT_CAP)
}

pub fn format_result_count_with_cap(total: u64, cap: u64) -> String {
    if total >= cap {
        format!("{}+", cap)
    } else {
        total.to_string()
    }
}
