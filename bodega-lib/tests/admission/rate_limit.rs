use bodega_lib::config::LimitsConfig;
use bodega_lib::{RateLimiter, RejectReason};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::helpers::event;

fn config() -> LimitsConfig {
    LimitsConfig {
        customer_window_ms: 200,
        customer_max: 3,
        tenant_window_ms: 200,
        tenant_max: 100,
        global_window_ms: 200,
        global_max: 1000,
        burst_window_ms: 50,
        burst_max: 3,
        violation_window_ms: 1_000,
        violation_threshold: 3,
        block_base_ms: 150,
        block_max_ms: 1_000,
    }
}

#[test]
fn allows_up_to_capacity_then_rejects() {
    let limiter = RateLimiter::new(config());

    for i in 0..3 {
        let decision = limiter.check(&event("c1", "t1", "hi"));
        assert!(decision.is_allowed(), "message {i} should be allowed");
    }

    let decision = limiter.check(&event("c1", "t1", "hi"));
    assert!(decision.is_rejected());
    assert_eq!(decision.reason(), Some(RejectReason::CustomerLimit));
    assert!(decision.user_message().is_some());
    let retry = decision.retry_after(Instant::now());
    assert!(retry.is_some_and(|d| d <= Duration::from_millis(200)));
}

#[test]
fn window_slides_and_capacity_returns() {
    let limiter = RateLimiter::new(config());

    for _ in 0..3 {
        assert!(limiter.check(&event("c2", "t1", "hi")).is_allowed());
    }
    assert!(limiter.check(&event("c2", "t1", "hi")).is_rejected());

    sleep(Duration::from_millis(220));
    assert!(limiter.check(&event("c2", "t1", "hi")).is_allowed());
}

#[test]
fn burst_window_rejects_faster_than_customer_window() {
    let mut cfg = config();
    cfg.customer_max = 10;
    cfg.burst_max = 2;
    let limiter = RateLimiter::new(cfg);

    assert!(limiter.check(&event("c3", "t1", "a")).is_allowed());
    assert!(limiter.check(&event("c3", "t1", "b")).is_allowed());
    let decision = limiter.check(&event("c3", "t1", "c"));
    assert_eq!(decision.reason(), Some(RejectReason::BurstLimit));
}

#[test]
fn tenant_limit_outranks_customer_limit() {
    let mut cfg = config();
    cfg.tenant_max = 2;
    cfg.customer_max = 100;
    cfg.burst_max = 100;
    let limiter = RateLimiter::new(cfg);

    assert!(limiter.check(&event("a", "t9", "x")).is_allowed());
    assert!(limiter.check(&event("b", "t9", "x")).is_allowed());
    let decision = limiter.check(&event("c", "t9", "x"));
    assert_eq!(decision.reason(), Some(RejectReason::TenantLimit));
}

#[test]
fn repeated_violations_escalate_into_a_block_that_expires() {
    let limiter = RateLimiter::new(config());

    // Fill the window, then keep hammering to accumulate violations.
    for _ in 0..3 {
        assert!(limiter.check(&event("c4", "t1", "hi")).is_allowed());
    }
    for _ in 0..3 {
        assert!(limiter.check(&event("c4", "t1", "hi")).is_rejected());
    }
    assert!(limiter.is_blocked("c4"));

    // While blocked, the rejection reason changes and capacity is untouched.
    let decision = limiter.check(&event("c4", "t1", "hi"));
    assert_eq!(decision.reason(), Some(RejectReason::RateBlocked));

    // Block expires on its own; the record is removed on next access.
    sleep(Duration::from_millis(400));
    assert!(!limiter.is_blocked("c4"));
    assert!(limiter.check(&event("c4", "t1", "hi")).is_allowed());
}

#[test]
fn global_congestion_never_blocks_an_innocent_customer() {
    let mut cfg = config();
    cfg.global_max = 1;
    cfg.customer_max = 100;
    cfg.burst_max = 100;
    let limiter = RateLimiter::new(cfg);

    // Someone else fills the global window.
    assert!(limiter.check(&event("busy", "t1", "hi")).is_allowed());

    // Repeated rejections during congestion are not the customer's fault
    // and must not escalate into a personal block.
    for _ in 0..5 {
        let decision = limiter.check(&event("innocent", "t2", "hi"));
        assert_eq!(decision.reason(), Some(RejectReason::GlobalLimit));
    }
    assert!(!limiter.is_blocked("innocent"));
    assert_eq!(limiter.stats().blocked_customers, 0);

    // Once the window slides, the customer is served normally.
    sleep(Duration::from_millis(220));
    assert!(limiter.check(&event("innocent", "t2", "hi")).is_allowed());
}

#[test]
fn manual_block_and_unblock() {
    let limiter = RateLimiter::new(config());

    limiter.block("c5", Duration::from_secs(60));
    assert!(limiter.is_blocked("c5"));
    assert_eq!(
        limiter.check(&event("c5", "t1", "hi")).reason(),
        Some(RejectReason::RateBlocked)
    );

    assert!(limiter.unblock("c5"));
    assert!(!limiter.is_blocked("c5"));
    assert!(limiter.check(&event("c5", "t1", "hi")).is_allowed());
}

#[test]
fn an_active_block_survives_clear_histories() {
    let limiter = RateLimiter::new(config());
    limiter.block("c6", Duration::from_secs(60));

    limiter.clear_histories();
    assert!(limiter.is_blocked("c6"));
}

#[test]
fn stats_reflect_activity() {
    let limiter = RateLimiter::new(config());
    assert!(limiter.check(&event("c7", "t1", "hi")).is_allowed());
    assert!(limiter.check(&event("c8", "t2", "hi")).is_allowed());

    let stats = limiter.stats();
    assert_eq!(stats.active_customers, 2);
    assert_eq!(stats.active_tenants, 2);
    assert_eq!(stats.global_count, 2);
    assert_eq!(stats.blocked_customers, 0);
}

#[test]
fn stats_ignore_expired_blocks() {
    let limiter = RateLimiter::new(config());

    limiter.block("c9", Duration::from_millis(50));
    assert_eq!(limiter.stats().blocked_customers, 1);

    // No sweep and no access: the record still sits in the map, but the
    // snapshot must not count it.
    sleep(Duration::from_millis(80));
    assert_eq!(limiter.stats().blocked_customers, 0);
}
