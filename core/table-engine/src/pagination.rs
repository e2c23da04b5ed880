//! FILENAME: core/table-engine/src/pagination.rs
//! PURPOSE: Page state and slicing of the filtered rows.
//! CONTEXT: Pages are 1-based. The slice for page `p` of size `s` is
//! `[s*(p-1), s*p)` clamped to the rows available, so an out-of-range page
//! yields no rows rather than an error. The page size is kept in the list of
//! selectable sizes.

use crate::definition::PaginationConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationState {
    pub page: usize,
    pub page_size: usize,
    /// Selectable sizes, ascending and without duplicates.
    pub page_sizes: Vec<usize>,
}

/// A partial update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PaginationPatch {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub page_sizes: Option<Vec<usize>>,
}

impl PaginationPatch {
    pub fn page(page: usize) -> Self {
        PaginationPatch {
            page: Some(page),
            ..Default::default()
        }
    }

    pub fn page_size(page_size: usize) -> Self {
        PaginationPatch {
            page_size: Some(page_size),
            ..Default::default()
        }
    }
}

impl PaginationState {
    pub fn new(page_size: usize, page_sizes: Vec<usize>) -> Self {
        let mut state = PaginationState {
            page: 1,
            page_size,
            page_sizes,
        };
        state.normalize();
        state
    }

    /// Initial state for a configured pagination block, starting on page 1.
    pub fn from_config(config: &PaginationConfig) -> Self {
        PaginationState::new(
            config.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            config.page_sizes.clone(),
        )
    }

    /// Merges `patch` into the state.
    pub fn apply(&mut self, patch: PaginationPatch) {
        if let Some(page) = patch.page {
            self.page = page;
        }
        if let Some(size) = patch.page_size {
            self.page_size = size;
        }
        if let Some(sizes) = patch.page_sizes {
            self.page_sizes = sizes;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.page = self.page.max(1);
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self.page_sizes.retain(|&size| size > 0);
        self.page_sizes.push(self.page_size);
        self.page_sizes.sort_unstable();
        self.page_sizes.dedup();
    }

    /// Index of the first row on the current page.
    pub fn offset(&self) -> usize {
        self.page_size.saturating_mul(self.page - 1)
    }

    /// Number of pages needed for `total` rows. At least one.
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Row range of the current page within `total` rows.
    pub fn range(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.offset().min(total);
        let end = start.saturating_add(self.page_size).min(total);
        start..end
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        PaginationState::new(DEFAULT_PAGE_SIZE, Vec::new())
    }
}

/// Slices `rows` to the current page. Without a state every row is kept.
pub fn paginate<T>(mut rows: Vec<T>, state: Option<&PaginationState>) -> Vec<T> {
    let Some(state) = state else {
        return rows;
    };
    let range = state.range(rows.len());
    rows.truncate(range.end);
    rows.drain(..range.start);
    rows
}
