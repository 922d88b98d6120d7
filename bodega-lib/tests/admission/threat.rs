use bodega_lib::config::ThreatConfig;
use bodega_lib::{RejectReason, Severity, ThreatMonitor};
use std::thread::sleep;
use std::time::Duration;

use crate::helpers::event;

fn config() -> ThreatConfig {
    ThreatConfig {
        short_window_ms: 200,
        short_max: 8,
        medium_window_ms: 1_000,
        medium_max: 30,
        block_base_ms: 150,
        block_max_ms: 2_000,
        ..ThreatConfig::default()
    }
}

#[test]
fn clean_message_is_allowed() {
    let monitor = ThreatMonitor::new(config());
    let decision = monitor.check_security(&event("c1", "t1", "hola, quiero un cafe"));
    assert!(decision.is_allowed());
    assert!(decision.severity().is_none());
}

#[test]
fn injection_like_content_raises_risk() {
    let monitor = ThreatMonitor::new(config());
    let decision = monitor.check_security(&event("c1", "t1", "<script>alert(1)</script>"));

    // A single high-severity content finding is not enough to block, but
    // the risk score moves.
    assert!(decision.is_allowed());
    let risk = monitor.risk_score("c1").unwrap();
    assert!(risk > 0.0);
}

#[test]
fn critical_delta_blocks_immediately() {
    let mut cfg = config();
    cfg.critical_delta = 5;
    cfg.high_delta = 4;
    cfg.medium_delta = 2;
    let monitor = ThreatMonitor::new(cfg);

    let decision = monitor.check_security(&event("c2", "t1", "<script>alert(1)</script>"));
    assert_eq!(decision.reason(), Some(RejectReason::ThreatCritical));
    assert_eq!(decision.severity(), Some(Severity::Critical));
    assert!(decision.user_message().is_some());
    assert!(monitor.is_blocked("c2"));

    // Subsequent messages are rejected without re-evaluation.
    let decision = monitor.check_security(&event("c2", "t1", "hola"));
    assert_eq!(decision.reason(), Some(RejectReason::ThreatBlocked));
}

#[test]
fn threat_block_expires() {
    let mut cfg = config();
    cfg.critical_delta = 5;
    cfg.high_delta = 4;
    cfg.medium_delta = 2;
    let monitor = ThreatMonitor::new(cfg);

    let decision = monitor.check_security(&event("c3", "t1", "<script>alert(1)</script>"));
    assert!(decision.is_rejected());

    // Block duration scales with risk but starts near block_base.
    sleep(Duration::from_millis(500));
    assert!(!monitor.is_blocked("c3"));
    assert!(monitor.check_security(&event("c3", "t1", "hola")).is_allowed());
}

#[test]
fn accumulated_violations_force_a_block() {
    let mut cfg = config();
    cfg.violation_limit = 3;
    let monitor = ThreatMonitor::new(cfg);

    // Each message lands one keyword finding; none is individually
    // critical, the accumulation is.
    let text = "free money for you my friend today";
    let mut blocked = false;
    for _ in 0..4 {
        let decision = monitor.check_security(&event("c4", "t1", text));
        if decision.reason() == Some(RejectReason::ThreatCritical) {
            blocked = true;
            break;
        }
        sleep(Duration::from_millis(10));
    }
    assert!(blocked, "violation accumulation should escalate into a block");
    assert!(monitor.is_blocked("c4"));
}

#[test]
fn whitelisted_customer_bypasses_everything() {
    let mut cfg = config();
    cfg.critical_delta = 5;
    cfg.whitelist = vec!["vip".to_string()];
    let monitor = ThreatMonitor::new(cfg);

    let decision = monitor.check_security(&event("vip", "t1", "<script>alert(1)</script>"));
    assert!(decision.is_allowed());
    assert!(monitor.risk_score("vip").is_none());
}

#[test]
fn whitelist_can_be_managed_at_runtime() {
    let monitor = ThreatMonitor::new(config());

    monitor.whitelist("c5");
    monitor.block("c5", Duration::from_secs(60));
    // Whitelist outranks an existing block.
    assert!(monitor.check_security(&event("c5", "t1", "hola")).is_allowed());

    assert!(monitor.unwhitelist("c5"));
    assert_eq!(
        monitor.check_security(&event("c5", "t1", "hola")).reason(),
        Some(RejectReason::ThreatBlocked)
    );
    assert!(monitor.unblock("c5"));
}

#[test]
fn risk_decays_while_idle_and_never_goes_negative() {
    let monitor = ThreatMonitor::new(config());

    monitor.check_security(&event("c6", "t1", "<script>alert(1)</script>"));
    let initial = monitor.risk_score("c6").unwrap();
    assert!(initial > 0.0);

    sleep(Duration::from_millis(1_100));
    monitor.sweep();
    let decayed = monitor.risk_score("c6");
    if let Some(decayed) = decayed {
        assert!(decayed < initial);
        assert!(decayed >= 0.0);
    }
    // A fully decayed record may have been dropped entirely; both outcomes
    // mean the score went down.
}

#[test]
fn coordinated_pattern_across_customers_is_flagged() {
    let mut cfg = config();
    cfg.pattern_min_customers = 3;
    let monitor = ThreatMonitor::new(cfg);
    let text = "visit my profile for a surprise";

    assert!(monitor.check_security(&event("a", "t1", text)).is_allowed());
    assert!(monitor.check_security(&event("b", "t1", text)).is_allowed());
    // The third distinct customer completes the pattern; a pattern finding
    // weighs 4, which lands in the medium band, still allowed.
    let decision = monitor.check_security(&event("c", "t1", text));
    assert!(decision.is_allowed());
    assert!(monitor.risk_score("c").unwrap() > monitor.risk_score("a").unwrap());
}

#[test]
fn stats_track_blocks_and_high_risk() {
    let mut cfg = config();
    cfg.critical_delta = 5;
    let monitor = ThreatMonitor::new(cfg);

    monitor.check_security(&event("c7", "t1", "<script>alert(1)</script>"));
    let stats = monitor.stats();
    assert_eq!(stats.tracked_customers, 1);
    assert_eq!(stats.blocked_customers, 1);
}

#[test]
fn stats_ignore_expired_blocks() {
    let monitor = ThreatMonitor::new(config());

    monitor.block("c8", Duration::from_millis(50));
    assert_eq!(monitor.stats().blocked_customers, 1);

    // The record is only removed lazily; the snapshot must not count it
    // once expired.
    sleep(Duration::from_millis(80));
    assert_eq!(monitor.stats().blocked_customers, 0);
}
