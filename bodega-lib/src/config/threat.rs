use serde::Deserialize;
use std::time::Duration;

/// Threat monitoring configuration
///
/// The monitor keeps its own short/medium rate windows separate from the
/// rate limiter, so a message can be rate-limited and threat-flagged for
/// different reasons.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ThreatConfig {
    /// Short observation window, milliseconds
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_short_window_ms")]
    pub short_window_ms: u64,
    /// Messages within the short window before the rate model flags
    /// Default: 8
    #[serde(default = "default_short_max")]
    pub short_max: usize,
    /// Medium observation window, milliseconds
    /// Default: 60000 (1 minute)
    #[serde(default = "default_medium_window_ms")]
    pub medium_window_ms: u64,
    /// Messages within the medium window before the rate model flags
    /// Default: 30
    #[serde(default = "default_medium_max")]
    pub medium_max: usize,
    /// Message length above which content analysis flags the message
    /// Default: 4096
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    /// Keyword fragments that mark a message as suspicious (lowercase match)
    #[serde(default = "default_suspicious_keywords")]
    pub suspicious_keywords: Vec<String>,
    /// Combined-delta threshold for a medium classification
    /// Default: 5
    #[serde(default = "default_medium_delta")]
    pub medium_delta: u32,
    /// Combined-delta threshold for a high classification
    /// Default: 10
    #[serde(default = "default_high_delta")]
    pub high_delta: u32,
    /// Combined-delta threshold for a critical classification
    /// Default: 20
    #[serde(default = "default_critical_delta")]
    pub critical_delta: u32,
    /// Violations within the medium window that force a block
    /// Default: 5
    #[serde(default = "default_violation_limit")]
    pub violation_limit: usize,
    /// Base block duration in milliseconds; scaled up by risk score
    /// Default: 120000 (2 minutes)
    #[serde(default = "default_block_base_ms")]
    pub block_base_ms: u64,
    /// Block duration cap in milliseconds
    /// Default: 3600000 (1 hour)
    #[serde(default = "default_block_max_ms")]
    pub block_max_ms: u64,
    /// Customers that bypass all threat checks
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Consecutive intervals required before timing analysis applies
    /// Default: 5
    #[serde(default = "default_bot_min_samples")]
    pub bot_min_samples: usize,
    /// Mean inter-message interval below which timing looks bot-like, ms
    /// Default: 2000
    #[serde(default = "default_bot_max_mean_ms")]
    pub bot_max_mean_ms: u64,
    /// Interval standard deviation below which timing looks bot-like, ms
    /// Default: 250
    #[serde(default = "default_bot_max_stddev_ms")]
    pub bot_max_stddev_ms: u64,
    /// Identical messages within the short window that count as flooding
    /// Default: 4
    #[serde(default = "default_identical_flood_max")]
    pub identical_flood_max: usize,
    /// Command messages within the short window that count as flooding
    /// Default: 5
    #[serde(default = "default_command_flood_max")]
    pub command_flood_max: usize,
    /// Window for cross-customer pattern grouping, milliseconds
    /// Default: 300000 (5 minutes)
    #[serde(default = "default_pattern_window_ms")]
    pub pattern_window_ms: u64,
    /// Distinct customers converging on near-identical content that mark a
    /// coordinated pattern
    /// Default: 3
    #[serde(default = "default_pattern_min_customers")]
    pub pattern_min_customers: usize,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            short_window_ms: default_short_window_ms(),
            short_max: default_short_max(),
            medium_window_ms: default_medium_window_ms(),
            medium_max: default_medium_max(),
            max_message_len: default_max_message_len(),
            suspicious_keywords: default_suspicious_keywords(),
            medium_delta: default_medium_delta(),
            high_delta: default_high_delta(),
            critical_delta: default_critical_delta(),
            violation_limit: default_violation_limit(),
            block_base_ms: default_block_base_ms(),
            block_max_ms: default_block_max_ms(),
            whitelist: vec![],
            bot_min_samples: default_bot_min_samples(),
            bot_max_mean_ms: default_bot_max_mean_ms(),
            bot_max_stddev_ms: default_bot_max_stddev_ms(),
            identical_flood_max: default_identical_flood_max(),
            command_flood_max: default_command_flood_max(),
            pattern_window_ms: default_pattern_window_ms(),
            pattern_min_customers: default_pattern_min_customers(),
        }
    }
}

impl ThreatConfig {
    pub fn short_window(&self) -> Duration {
        Duration::from_millis(self.short_window_ms)
    }

    pub fn medium_window(&self) -> Duration {
        Duration::from_millis(self.medium_window_ms)
    }

    pub fn block_base(&self) -> Duration {
        Duration::from_millis(self.block_base_ms)
    }

    pub fn block_max(&self) -> Duration {
        Duration::from_millis(self.block_max_ms)
    }

    pub fn pattern_window(&self) -> Duration {
        Duration::from_millis(self.pattern_window_ms)
    }
}

fn default_short_window_ms() -> u64 {
    10_000
}

fn default_short_max() -> usize {
    8
}

fn default_medium_window_ms() -> u64 {
    60_000
}

fn default_medium_max() -> usize {
    30
}

fn default_max_message_len() -> usize {
    4096
}

fn default_suspicious_keywords() -> Vec<String> {
    [
        "free money",
        "click here",
        "guaranteed winner",
        "wire transfer",
        "crypto giveaway",
        "verify your account",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_medium_delta() -> u32 {
    5
}

fn default_high_delta() -> u32 {
    10
}

fn default_critical_delta() -> u32 {
    20
}

fn default_violation_limit() -> usize {
    5
}

fn default_block_base_ms() -> u64 {
    120_000
}

fn default_block_max_ms() -> u64 {
    3_600_000
}

fn default_bot_min_samples() -> usize {
    5
}

fn default_bot_max_mean_ms() -> u64 {
    2000
}

fn default_bot_max_stddev_ms() -> u64 {
    250
}

fn default_identical_flood_max() -> usize {
    4
}

fn default_command_flood_max() -> usize {
    5
}

fn default_pattern_window_ms() -> u64 {
    300_000
}

fn default_pattern_min_customers() -> usize {
    3
}
