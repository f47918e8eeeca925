//! Page windows over an ordered list.
//!
//! Pages are 1-based. Indices are not clamped to the list length; use
//! [`PageWindow::slice`] to cut a list safely, which yields a short or empty
//! window past the end instead of failing.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    /// The effective (1-based) page number.
    pub page: usize,
    pub page_size: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageWindow {
    /// The part of `items` this window covers.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.start_index.min(items.len());
        let end = self.end_index.min(items.len());
        &items[start..end]
    }
}

/// Compute the window for `page` over `total_count` items.
///
/// Page `0` is treated as page `1` and a `page_size` of `0` as `1`.
pub fn paginate(total_count: usize, page: usize, page_size: usize) -> PageWindow {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start_index = (page - 1).saturating_mul(page_size);
    let end_index = start_index.saturating_add(page_size);

    PageWindow {
        page,
        page_size,
        start_index,
        end_index,
        total_pages: total_count.div_ceil(page_size),
        has_next: end_index < total_count,
        has_prev: page > 1,
    }
}
