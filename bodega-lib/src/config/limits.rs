use serde::Deserialize;
use std::time::Duration;

/// Rate limiting configuration
///
/// Three independent scopes (customer, tenant, global), each with its own
/// trailing window and capacity, plus a short per-customer burst window.
/// Repeated violations escalate into temporary blocks.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LimitsConfig {
    /// Per-customer window in milliseconds
    /// Default: 60000 (1 minute)
    #[serde(default = "default_customer_window_ms")]
    pub customer_window_ms: u64,
    /// Maximum messages per customer within the window
    /// Default: 20
    #[serde(default = "default_customer_max")]
    pub customer_max: usize,
    /// Per-tenant window in milliseconds
    /// Default: 60000 (1 minute)
    #[serde(default = "default_tenant_window_ms")]
    pub tenant_window_ms: u64,
    /// Maximum messages per tenant within the window
    /// Default: 300
    #[serde(default = "default_tenant_max")]
    pub tenant_max: usize,
    /// Global window in milliseconds
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_global_window_ms")]
    pub global_window_ms: u64,
    /// Maximum messages across all tenants within the global window
    /// Default: 1000
    #[serde(default = "default_global_max")]
    pub global_max: usize,
    /// Burst window in milliseconds (catches rapid-fire sequences even when
    /// the longer customer window has headroom)
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_burst_window_ms")]
    pub burst_window_ms: u64,
    /// Maximum messages per customer within the burst window
    /// Default: 8
    #[serde(default = "default_burst_max")]
    pub burst_max: usize,
    /// Rolling period over which violations are counted
    /// Default: 300000 (5 minutes)
    #[serde(default = "default_violation_window_ms")]
    pub violation_window_ms: u64,
    /// Violations within the rolling period that trigger a block
    /// Default: 3
    #[serde(default = "default_violation_threshold")]
    pub violation_threshold: usize,
    /// Base block duration in milliseconds; doubles per extra violation
    /// Default: 60000 (1 minute)
    #[serde(default = "default_block_base_ms")]
    pub block_base_ms: u64,
    /// Block duration cap in milliseconds
    /// Default: 1800000 (30 minutes)
    #[serde(default = "default_block_max_ms")]
    pub block_max_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            customer_window_ms: default_customer_window_ms(),
            customer_max: default_customer_max(),
            tenant_window_ms: default_tenant_window_ms(),
            tenant_max: default_tenant_max(),
            global_window_ms: default_global_window_ms(),
            global_max: default_global_max(),
            burst_window_ms: default_burst_window_ms(),
            burst_max: default_burst_max(),
            violation_window_ms: default_violation_window_ms(),
            violation_threshold: default_violation_threshold(),
            block_base_ms: default_block_base_ms(),
            block_max_ms: default_block_max_ms(),
        }
    }
}

impl LimitsConfig {
    pub fn customer_window(&self) -> Duration {
        Duration::from_millis(self.customer_window_ms)
    }

    pub fn tenant_window(&self) -> Duration {
        Duration::from_millis(self.tenant_window_ms)
    }

    pub fn global_window(&self) -> Duration {
        Duration::from_millis(self.global_window_ms)
    }

    pub fn burst_window(&self) -> Duration {
        Duration::from_millis(self.burst_window_ms)
    }

    pub fn violation_window(&self) -> Duration {
        Duration::from_millis(self.violation_window_ms)
    }

    pub fn block_base(&self) -> Duration {
        Duration::from_millis(self.block_base_ms)
    }

    pub fn block_max(&self) -> Duration {
        Duration::from_millis(self.block_max_ms)
    }
}

fn default_customer_window_ms() -> u64 {
    60_000
}

fn default_customer_max() -> usize {
    20
}

fn default_tenant_window_ms() -> u64 {
    60_000
}

fn default_tenant_max() -> usize {
    300
}

fn default_global_window_ms() -> u64 {
    10_000
}

fn default_global_max() -> usize {
    1000
}

fn default_burst_window_ms() -> u64 {
    10_000
}

fn default_burst_max() -> usize {
    8
}

fn default_violation_window_ms() -> u64 {
    300_000
}

fn default_violation_threshold() -> usize {
    3
}

fn default_block_base_ms() -> u64 {
    60_000
}

fn default_block_max_ms() -> u64 {
    1_800_000
}
