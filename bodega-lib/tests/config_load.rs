use std::io::Write;

use bodega_lib::config::load_from_path;
use tempfile::NamedTempFile;

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(toml.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_minimal_config_with_defaults() {
    let file = write_config(r#"listen = "127.0.0.1:0""#);

    let config = load_from_path(file.path()).expect("minimal config loads");
    assert_eq!(config.listen.to_string(), "127.0.0.1:0");
    assert_eq!(config.limits.customer_max, 20);
    assert_eq!(config.duplicates.similarity_threshold, 0.8);
    assert_eq!(config.duplicates.max_similarity_len, 512);
    assert_eq!(config.sessions.idle_timeout_ms, 1_800_000);
    assert_eq!(config.logging.level, "info");
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn loads_overridden_sections() {
    let file = write_config(
        r#"
listen = "0.0.0.0:7100"

[limits]
customer_max = 5
customer_window_ms = 30000

[threat]
whitelist = ["vip-1", "vip-2"]

[telemetry]
metrics_port = 9091
"#,
    );

    let config = load_from_path(file.path()).expect("config loads");
    assert_eq!(config.limits.customer_max, 5);
    assert_eq!(config.limits.customer_window_ms, 30_000);
    // Untouched fields keep their defaults.
    assert_eq!(config.limits.tenant_max, 300);
    assert_eq!(config.threat.whitelist, vec!["vip-1", "vip-2"]);
    assert_eq!(config.telemetry.metrics_port, Some(9091));
}

#[test]
fn missing_listen_is_an_error() {
    let file = write_config("[limits]\ncustomer_max = 5\n");
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn zero_window_is_rejected() {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[limits]
customer_window_ms = 0
"#,
    );
    let err = load_from_path(file.path()).expect_err("zero window rejected");
    assert!(err.to_string().contains("customer_window_ms"));
}

#[test]
fn similarity_threshold_must_be_in_range() {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[duplicates]
similarity_threshold = 1.5
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn similarity_length_bounds_must_be_ordered() {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[duplicates]
min_similarity_len = 100
max_similarity_len = 50
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn idle_timeout_must_not_exceed_absolute() {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[sessions]
idle_timeout_ms = 100000
absolute_timeout_ms = 50000
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn memory_thresholds_must_be_ordered() {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[sessions]
memory_warn_bytes = 1000
memory_critical_bytes = 1000
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn threat_deltas_must_be_increasing() {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[threat]
medium_delta = 10
high_delta = 10
critical_delta = 20
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn missing_file_is_an_io_style_error() {
    assert!(load_from_path("/definitely/not/here.toml").is_err());
}
