mod duplicates;
mod limits;
mod loader;
mod root;
mod sessions;
mod telemetry;
mod threat;

pub use duplicates::DuplicateConfig;
pub use limits::LimitsConfig;
pub use loader::load_from_path;
pub use root::Config;
pub use sessions::SessionConfig;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use threat::ThreatConfig;
