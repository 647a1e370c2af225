//! Pagination for read accessors
//!
//! All paginated reads share the same contract: `page >= 1`,
//! `limit` in 1-50, default 20.

use crate::{MarketError, Result};
use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_LIMIT: u32 = 20;
/// Maximum page size
pub const MAX_LIMIT: u32 = 50;

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    /// Create a validated page request
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < 1 {
            return Err(MarketError::invalid_field("page", "must be at least 1"));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(MarketError::invalid_field(
                "limit",
                format!("must be between 1 and {}", MAX_LIMIT),
            ));
        }
        Ok(Self { page, limit })
    }

    /// The 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Items per page
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Zero-based item offset
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// Apply this page to an already-ordered slice
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}
