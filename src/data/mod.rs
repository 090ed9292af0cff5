//! Data layer
//!
//! Result-set handling that is independent of any transport: pagination
//! and page navigation.

pub mod pagination;

pub use pagination::{
    format_result_count, page_window, slice, total_pages, PageItem, DEFAULT_PAGE_SIZE,
};
