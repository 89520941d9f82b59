//! In-memory caches for reconstructed vouchers and their aggregates.

mod pages;
mod scalar;
mod window;

pub use pages::{CachedPage, PageResult, PaginationCache, Slot};
pub use scalar::ScalarCache;
pub use window::QueryWindow;

use crate::voucher::rules::compact_date;

/// Date range and company whose cached data should be dropped.
///
/// A cache key matches when it contains all three normalized values as
/// substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationScope {
    from_date: String,
    to_date: String,
    company_name: String,
}

impl InvalidationScope {
    pub fn new(from_date: &str, to_date: &str, company_name: &str) -> Self {
        let normalize = |d: &str| compact_date(d).unwrap_or_else(|| d.trim().to_string());
        Self {
            from_date: normalize(from_date),
            to_date: normalize(to_date),
            company_name: company_name.trim().to_string(),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        key.contains(&self.from_date) && key.contains(&self.to_date) && key.contains(&self.company_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_requires_all_three() {
        let scope = InvalidationScope::new("2024-04-01", "20240430", " Acme ");
        assert!(scope.matches("vouchers|20240401|20240430|Acme|50|"));
        assert!(scope.matches("summary|vouchers|20240401|20240430|Acme Ltd|50|"));
        assert!(!scope.matches("vouchers|20240401|20240430|Other|50|"));
        assert!(!scope.matches("vouchers|20240402|20240430|Acme|50|"));
        assert!(!scope.matches("vouchers|20240401|20240501|Acme|50|"));
    }
}
