use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{GateError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config =
        toml::from_str(&txt).map_err(|e| GateError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    let windows = [
        ("limits.customer_window_ms", cfg.limits.customer_window_ms),
        ("limits.tenant_window_ms", cfg.limits.tenant_window_ms),
        ("limits.global_window_ms", cfg.limits.global_window_ms),
        ("limits.burst_window_ms", cfg.limits.burst_window_ms),
        ("duplicates.exact_window_ms", cfg.duplicates.exact_window_ms),
        ("duplicates.processing_timeout_ms", cfg.duplicates.processing_timeout_ms),
        ("threat.short_window_ms", cfg.threat.short_window_ms),
        ("threat.medium_window_ms", cfg.threat.medium_window_ms),
        ("sessions.idle_timeout_ms", cfg.sessions.idle_timeout_ms),
        ("sessions.absolute_timeout_ms", cfg.sessions.absolute_timeout_ms),
        ("sessions.sweep_interval_ms", cfg.sessions.sweep_interval_ms),
    ];
    for (name, value) in windows {
        if value == 0 {
            return Err(GateError::Config(format!("{name} must be greater than zero")));
        }
    }

    let caps = [
        ("limits.customer_max", cfg.limits.customer_max),
        ("limits.tenant_max", cfg.limits.tenant_max),
        ("limits.global_max", cfg.limits.global_max),
        ("limits.burst_max", cfg.limits.burst_max),
        ("sessions.max_sessions", cfg.sessions.max_sessions),
    ];
    for (name, value) in caps {
        if value == 0 {
            return Err(GateError::Config(format!("{name} must be greater than zero")));
        }
    }

    let sim = cfg.duplicates.similarity_threshold;
    if !(sim > 0.0 && sim <= 1.0) {
        return Err(GateError::Config(format!(
            "duplicates.similarity_threshold must be in (0, 1], got {sim}"
        )));
    }

    if cfg.duplicates.max_similarity_len < cfg.duplicates.min_similarity_len {
        return Err(GateError::Config(
            "duplicates.max_similarity_len must be at least duplicates.min_similarity_len".into(),
        ));
    }

    if cfg.sessions.idle_timeout_ms > cfg.sessions.absolute_timeout_ms {
        return Err(GateError::Config(
            "sessions.idle_timeout_ms must not exceed sessions.absolute_timeout_ms".into(),
        ));
    }

    if cfg.sessions.memory_warn_bytes >= cfg.sessions.memory_critical_bytes {
        return Err(GateError::Config(
            "sessions.memory_warn_bytes must be below sessions.memory_critical_bytes".into(),
        ));
    }

    if cfg.threat.medium_delta >= cfg.threat.high_delta
        || cfg.threat.high_delta >= cfg.threat.critical_delta
    {
        return Err(GateError::Config(
            "threat delta thresholds must be strictly increasing (medium < high < critical)".into(),
        ));
    }

    if cfg.limits.block_base_ms > cfg.limits.block_max_ms {
        return Err(GateError::Config(
            "limits.block_base_ms must not exceed limits.block_max_ms".into(),
        ));
    }

    Ok(())
}
