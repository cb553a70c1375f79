//! Paged list results and bulk operation reports.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        PageRequest { page, size }
    }

    /// # Errors
    /// Returns `Error::ValidationError` for page 0 or size 0
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::ValidationError(
                "page numbers start at 1".to_string(),
            ));
        }
        if self.size == 0 {
            return Err(Error::ValidationError(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of items before this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest { page: 1, size: 20 }
    }
}

/// One page of a list query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: u64,
    pub page: usize,
    pub size: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(self.size as u64)
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}

/// Failure of one item in a bulk operation.
#[derive(Clone, Debug)]
pub struct BulkFailure {
    /// Position of the item in the request.
    pub index: usize,
    pub error: Error,
}

/// Outcome of a bulk operation. Items are processed independently: failures are reported
/// here and never roll back the items that succeeded.
#[derive(Clone, Debug)]
pub struct BulkResult<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BulkFailure>,
}

impl<T> BulkResult<T> {
    /// Split per-item results, keeping request order within each side.
    pub fn from_results(results: Vec<Result<T>>) -> Self {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(value) => succeeded.push(value),
                Err(error) => failed.push(BulkFailure { index, error }),
            }
        }
        BulkResult { succeeded, failed }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.index).collect()
    }
}
