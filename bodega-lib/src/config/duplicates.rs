use serde::Deserialize;
use std::time::Duration;

/// Duplicate detection configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DuplicateConfig {
    /// Window for exact duplicates (message id or content hash), milliseconds
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_exact_window_ms")]
    pub exact_window_ms: u64,
    /// Recency window for per-customer and tenant-wide history scans,
    /// milliseconds
    /// Default: 300000 (5 minutes)
    #[serde(default = "default_history_window_ms")]
    pub history_window_ms: u64,
    /// Ring buffer capacity for per-customer message history
    /// Default: 32
    #[serde(default = "default_customer_history")]
    pub customer_history: usize,
    /// Ring buffer capacity for per-tenant message history
    /// Default: 256
    #[serde(default = "default_tenant_history")]
    pub tenant_history: usize,
    /// Minimum text length before edit-distance similarity is computed
    /// Default: 10
    #[serde(default = "default_min_similarity_len")]
    pub min_similarity_len: usize,
    /// Maximum text length for edit-distance similarity; longer texts are
    /// only matched by the exact content hash. The scan is quadratic in
    /// text length and runs under the detector's lock.
    /// Default: 512
    #[serde(default = "default_max_similarity_len")]
    pub max_similarity_len: usize,
    /// Normalized similarity at or above which two texts count as
    /// near-duplicates, in (0, 1]
    /// Default: 0.8
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Identical messages from other customers that mark tenant-wide spam
    /// Default: 3
    #[serde(default = "default_identical_threshold")]
    pub identical_threshold: usize,
    /// Near-identical messages from distinct other customers that mark
    /// tenant-wide spam
    /// Default: 5
    #[serde(default = "default_similar_threshold")]
    pub similar_threshold: usize,
    /// Hard timeout after which a processing lock is considered stale,
    /// milliseconds
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_processing_timeout_ms")]
    pub processing_timeout_ms: u64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            exact_window_ms: default_exact_window_ms(),
            history_window_ms: default_history_window_ms(),
            customer_history: default_customer_history(),
            tenant_history: default_tenant_history(),
            min_similarity_len: default_min_similarity_len(),
            max_similarity_len: default_max_similarity_len(),
            similarity_threshold: default_similarity_threshold(),
            identical_threshold: default_identical_threshold(),
            similar_threshold: default_similar_threshold(),
            processing_timeout_ms: default_processing_timeout_ms(),
        }
    }
}

impl DuplicateConfig {
    pub fn exact_window(&self) -> Duration {
        Duration::from_millis(self.exact_window_ms)
    }

    pub fn history_window(&self) -> Duration {
        Duration::from_millis(self.history_window_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }
}

fn default_exact_window_ms() -> u64 {
    30_000
}

fn default_history_window_ms() -> u64 {
    300_000
}

fn default_customer_history() -> usize {
    32
}

fn default_tenant_history() -> usize {
    256
}

fn default_min_similarity_len() -> usize {
    10
}

fn default_max_similarity_len() -> usize {
    512
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_identical_threshold() -> usize {
    3
}

fn default_similar_threshold() -> usize {
    5
}

fn default_processing_timeout_ms() -> u64 {
    30_000
}
