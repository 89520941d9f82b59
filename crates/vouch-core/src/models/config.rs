//! Configuration structures for the voucher pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for the vouch pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VouchConfig {
    /// Accounting system endpoint.
    pub source: SourceConfig,

    /// Page and scalar cache settings.
    pub cache: CacheConfig,

    /// Voucher reconstruction settings.
    pub extraction: ExtractionConfig,

    /// Background prefetch settings.
    pub prefetch: PrefetchConfig,
}

/// Endpoint of the accounting system's XML interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL the export request is posted to.
    pub url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Cache sizing and freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached page window, in seconds.
    pub ttl_secs: u64,

    /// Maximum number of query windows kept in the page cache.
    pub max_entries: usize,

    /// Lifetime of scalar aggregates, in seconds.
    pub scalar_ttl_secs: u64,

    /// Maximum number of scalar aggregates.
    pub scalar_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 50,
            scalar_ttl_secs: 600,
            scalar_max_entries: 200,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn scalar_ttl(&self) -> Duration {
        Duration::from_secs(self.scalar_ttl_secs)
    }
}

/// Voucher reconstruction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Voucher types kept by the engine (exact, case-sensitive).
    pub allowed_types: Vec<String>,

    /// Default page size for queries.
    pub page_size: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            allowed_types: vec!["Tax Invoice".to_string()],
            page_size: 100,
        }
    }
}

/// Background prefetch of neighbouring pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub enabled: bool,

    /// Pages fetched on each side of the requested page.
    pub radius: u32,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 2,
        }
    }
}

impl VouchConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
