use serde::Deserialize;
use std::net::SocketAddr;

use super::duplicates::DuplicateConfig;
use super::limits::LimitsConfig;
use super::sessions::SessionConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::threat::ThreatConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port the dev chat transport listens on
    /// Example: "0.0.0.0:7100" or "127.0.0.1:7100"
    pub listen: SocketAddr,
    /// Rate limiting (customer / tenant / global scopes + burst + blocks)
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Duplicate and coordinated-spam detection
    #[serde(default)]
    pub duplicates: DuplicateConfig,
    /// Behavioral threat scoring
    #[serde(default)]
    pub threat: ThreatConfig,
    /// Session lifecycle (timeouts, sweeps, memory pressure)
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
