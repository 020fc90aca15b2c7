use serde::{Deserialize, Serialize};

pub const DEFAULT_ITEMS_PER_PAGE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub active_page: u32,
    pub items_per_page: u32,
    pub total_items: u64,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            active_page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            total_items: 0,
        }
    }
}

impl PaginationState {
    pub fn with_items_per_page(items_per_page: u32) -> Self {
        Self {
            items_per_page: items_per_page.max(1),
            ..Self::default()
        }
    }

    /// Highest displayable page; an empty result set still has page 1.
    pub fn last_page(&self) -> u32 {
        let per_page = u64::from(self.items_per_page.max(1));
        let pages = self.total_items.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn clamp_page(&self, page: i64) -> u32 {
        let last = i64::from(self.last_page());
        // `last` is at least 1 and fits in u32, so the clamp result does too.
        u32::try_from(page.clamp(1, last)).unwrap_or(1)
    }

    pub fn is_out_of_range(&self) -> bool {
        self.active_page < 1 || self.active_page > self.last_page()
    }
}

/// Partial update for pager bindings; `None` leaves the field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationPatch {
    pub active_page: Option<i64>,
    pub items_per_page: Option<u32>,
    pub total_items: Option<u64>,
}

impl PaginationPatch {
    pub fn page(page: i64) -> Self {
        Self {
            active_page: Some(page),
            ..Self::default()
        }
    }

    pub fn total_items(total_items: u64) -> Self {
        Self {
            total_items: Some(total_items),
            ..Self::default()
        }
    }
}
