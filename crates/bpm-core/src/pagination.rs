//! Pagination request/response types shared by every list operation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MIN_PAGE_SIZE: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 200;

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// 1-based page index and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Build a validated page request.
    pub fn new(page: i64, page_size: i64) -> Result<Self> {
        let req = Self { page, page_size };
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(Error::InvalidInput(format!(
                "page must be >= 1, got {}",
                self.page
            )));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidInput(format!(
                "page_size must be between {} and {}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }
        Ok(())
    }

    /// Rows to skip. Saturates, so a far-out page is simply past the end.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

/// One page of a filtered listing plus the total matching count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: &PageRequest, total: i64, items: Vec<T>) -> Self {
        Self {
            total,
            page: request.page,
            page_size: request.page_size,
            items,
        }
    }

    /// Number of pages available for `total` at this page size.
    pub fn page_count(&self) -> i64 {
        if self.page_size <= 0 {
            return 0;
        }
        (self.total + self.page_size - 1) / self.page_size
    }
}
