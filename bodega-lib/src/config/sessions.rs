use serde::Deserialize;
use std::time::Duration;

/// Session store configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Idle timeout in milliseconds: a session untouched for this long is
    /// expired on next access or sweep
    /// Default: 1800000 (30 minutes)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Absolute timeout in milliseconds, counted from session creation
    /// Default: 21600000 (6 hours)
    #[serde(default = "default_absolute_timeout_ms")]
    pub absolute_timeout_ms: u64,
    /// Interval between proactive expiry sweeps, milliseconds
    /// Default: 60000 (1 minute)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Hard cap on concurrently stored sessions
    /// Default: 10000
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Process memory above which idle sessions are evicted early, bytes
    /// Default: 268435456 (256 MiB)
    #[serde(default = "default_memory_warn_bytes")]
    pub memory_warn_bytes: u64,
    /// Process memory above which an emergency sweep also clears
    /// duplicate/rate-limit histories, bytes
    /// Default: 536870912 (512 MiB)
    #[serde(default = "default_memory_critical_bytes")]
    pub memory_critical_bytes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            absolute_timeout_ms: default_absolute_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            max_sessions: default_max_sessions(),
            memory_warn_bytes: default_memory_warn_bytes(),
            memory_critical_bytes: default_memory_critical_bytes(),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn absolute_timeout(&self) -> Duration {
        Duration::from_millis(self.absolute_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_idle_timeout_ms() -> u64 {
    1_800_000
}

fn default_absolute_timeout_ms() -> u64 {
    21_600_000
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_memory_warn_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_memory_critical_bytes() -> u64 {
    512 * 1024 * 1024
}
