//! Normalized key of one paginated result set.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::voucher::rules::compact_date;

/// Date range, company, page size and search filter of a paginated query.
///
/// Fields are normalized on construction (trimmed, dates as `YYYYMMDD`), so
/// two windows built from differently formatted input compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryWindow {
    from_date: String,
    to_date: String,
    company_name: String,
    page_size: usize,
    search_filter: String,
}

impl QueryWindow {
    /// Validate and normalize a query window.
    pub fn new(
        from_date: &str,
        to_date: &str,
        company_name: &str,
        page_size: usize,
    ) -> Result<Self, ValidationError> {
        let company_name = company_name.trim();
        if company_name.is_empty() {
            return Err(ValidationError::MissingCompany);
        }
        if page_size == 0 {
            return Err(ValidationError::ZeroPageSize);
        }

        let from = compact_date(from_date).ok_or_else(|| ValidationError::InvalidDate {
            field: "from",
            value: from_date.to_string(),
        })?;
        let to = compact_date(to_date).ok_or_else(|| ValidationError::InvalidDate {
            field: "to",
            value: to_date.to_string(),
        })?;
        // YYYYMMDD strings order like the dates they encode.
        if from > to {
            return Err(ValidationError::ReversedRange { from, to });
        }

        Ok(Self {
            from_date: from,
            to_date: to,
            company_name: company_name.to_string(),
            page_size,
            search_filter: String::new(),
        })
    }

    /// Set the free-text search filter.
    pub fn with_filter(mut self, filter: &str) -> Self {
        self.search_filter = filter.trim().to_string();
        self
    }

    pub fn from_date(&self) -> &str {
        &self.from_date
    }

    pub fn to_date(&self) -> &str {
        &self.to_date
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn search_filter(&self) -> &str {
        &self.search_filter
    }

    /// Deterministic string form of the window, used for invalidation.
    pub fn cache_key(&self) -> String {
        format!(
            "vouchers|{}|{}|{}|{}|{}",
            self.from_date, self.to_date, self.company_name, self.page_size, self.search_filter
        )
    }

    /// Slot indices covered by a 1-based page.
    pub fn page_range(&self, page: u32) -> Range<usize> {
        let page = page.max(1) as usize;
        let start = (page - 1).saturating_mul(self.page_size);
        start..start.saturating_add(self.page_size)
    }

    /// Number of pages needed for `total_count` vouchers.
    pub fn total_pages(&self, total_count: usize) -> u32 {
        total_count.div_ceil(self.page_size) as u32
    }
}
