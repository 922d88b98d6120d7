use bodega_lib::admission::pipeline::{NoopDuplicateGate, NoopRateGate, NoopThreatGate};
use bodega_lib::config::{Config, LimitsConfig, ThreatConfig};
use bodega_lib::{AdmissionPipeline, RejectReason, SessionStep};
use std::sync::Arc;
use std::time::Duration;

use crate::helpers::{event, event_with_id};

fn config() -> Config {
    Config {
        listen: "127.0.0.1:0".parse().expect("valid listen address"),
        limits: LimitsConfig::default(),
        duplicates: Default::default(),
        threat: ThreatConfig::default(),
        sessions: Default::default(),
        logging: Default::default(),
        telemetry: Default::default(),
    }
}

#[test]
fn admitted_event_carries_a_live_session() {
    let pipeline = AdmissionPipeline::new(&config());

    let admitted = pipeline
        .admit(event("c1", "t1", "hola"))
        .expect("clean event should be admitted");
    assert_eq!(admitted.session.step, SessionStep::Menu);
    assert!(admitted.fingerprint.is_some());
    assert_eq!(pipeline.sessions().len(), 1);

    let session = admitted.session.clone();
    pipeline.complete(&admitted, session);
}

#[test]
fn invalid_events_never_reach_the_gates() {
    let pipeline = AdmissionPipeline::new(&config());

    let decision = pipeline
        .admit(event("", "t1", "hola"))
        .expect_err("missing customer id must be rejected");
    assert_eq!(decision.reason(), Some(RejectReason::InvalidEvent));
    assert_eq!(pipeline.sessions().len(), 0);
}

#[test]
fn duplicate_redelivery_is_rejected_after_admission() {
    let pipeline = AdmissionPipeline::new(&config());

    let admitted = pipeline
        .admit(event_with_id("c1", "t1", "hola", "m-1"))
        .expect("first delivery admitted");
    let session = admitted.session.clone();
    pipeline.complete(&admitted, session);

    let decision = pipeline
        .admit(event_with_id("c1", "t1", "hola", "m-1"))
        .expect_err("redelivery must be rejected");
    assert_eq!(decision.reason(), Some(RejectReason::ExactMessageId));
}

#[test]
fn manually_blocked_customer_is_rejected_before_duplicates() {
    let pipeline = AdmissionPipeline::new(&config());

    pipeline.block_customer("c2", Duration::from_secs(60));
    let decision = pipeline
        .admit(event("c2", "t1", "hola"))
        .expect_err("blocked customer rejected");
    assert_eq!(decision.reason(), Some(RejectReason::RateBlocked));
    assert!(decision.retry_after(std::time::Instant::now()).is_some());
}

#[test]
fn rate_limit_stage_runs_before_duplicates() {
    let mut cfg = config();
    cfg.limits.customer_max = 1;
    cfg.limits.burst_max = 10;
    let pipeline = AdmissionPipeline::new(&cfg);

    let admitted = pipeline.admit(event("c3", "t1", "hola")).expect("first admitted");
    let session = admitted.session.clone();
    pipeline.complete(&admitted, session);

    // The identical text would also be an exact duplicate, but the rate
    // limiter rejects first.
    let decision = pipeline
        .admit(event("c3", "t1", "hola"))
        .expect_err("second message over capacity");
    assert_eq!(decision.reason(), Some(RejectReason::CustomerLimit));
}

#[test]
fn noop_gates_admit_everything() {
    let pipeline = AdmissionPipeline::new(&config())
        .with_threat_gate(Arc::new(NoopThreatGate))
        .with_rate_gate(Arc::new(NoopRateGate))
        .with_duplicate_gate(Arc::new(NoopDuplicateGate));

    for _ in 0..50 {
        let admitted = pipeline
            .admit(event_with_id("c4", "t1", "same text", "same-id"))
            .expect("no-op gates never reject");
        assert!(admitted.fingerprint.is_none());
        let session = admitted.session.clone();
        pipeline.complete(&admitted, session);
    }
}

#[test]
fn finish_order_deletes_the_session() {
    let pipeline = AdmissionPipeline::new(&config());

    let admitted = pipeline.admit(event("c5", "t1", "order pan")).expect("admitted");
    let mut session = admitted.session.clone();
    session.advance(SessionStep::QuickOrder).expect("menu to quick order");

    pipeline.finish_order(&admitted, &session).expect("terminal action");
    assert_eq!(pipeline.sessions().len(), 0);

    // The next message starts over at the menu.
    let admitted = pipeline.admit(event("c5", "t1", "hola")).expect("admitted");
    assert_eq!(admitted.session.step, SessionStep::Menu);
}

#[test]
fn finish_order_requires_a_completable_step() {
    let pipeline = AdmissionPipeline::new(&config());

    let admitted = pipeline.admit(event("c6", "t1", "hola")).expect("admitted");
    let session = admitted.session.clone();
    // Still at the menu; the terminal action is illegal here.
    assert!(pipeline.finish_order(&admitted, &session).is_err());
    assert_eq!(pipeline.sessions().len(), 1);
}

#[test]
fn unblock_lifts_blocks_from_both_components() {
    let pipeline = AdmissionPipeline::new(&config());

    pipeline.block_customer("c7", Duration::from_secs(60));
    assert!(pipeline.admit(event("c7", "t1", "hola")).is_err());

    assert!(pipeline.unblock_customer("c7"));
    assert!(pipeline.admit(event("c7", "t1", "hola")).is_ok());
}

#[test]
fn stats_snapshot_covers_every_component() {
    let pipeline = AdmissionPipeline::new(&config());
    let admitted = pipeline.admit(event("c8", "t1", "hola")).expect("admitted");
    let session = admitted.session.clone();
    pipeline.complete(&admitted, session);

    let stats = pipeline.stats();
    let json = serde_json::to_value(&stats).expect("stats serialize");
    assert!(json.get("threat").is_some());
    assert!(json.get("rate_limit").is_some());
    assert!(json.get("duplicates").is_some());
    assert_eq!(json["sessions"]["active_sessions"], 1);
}

#[test]
fn sweep_runs_across_all_components() {
    let mut cfg = config();
    cfg.sessions.idle_timeout_ms = 50;
    let pipeline = AdmissionPipeline::new(&cfg);

    let admitted = pipeline.admit(event("c9", "t1", "hola")).expect("admitted");
    let session = admitted.session.clone();
    pipeline.complete(&admitted, session);

    std::thread::sleep(Duration::from_millis(100));
    pipeline.sweep();
    assert_eq!(pipeline.sessions().len(), 0);
}
