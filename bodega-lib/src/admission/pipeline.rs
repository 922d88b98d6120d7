//! The fixed-order admission pipeline.
//!
//! `threat -> rate limit -> duplicate -> session` with the first rejection
//! short-circuiting. Each stage sits behind a capability trait so a
//! deployment can swap in a no-op gate at construction time; the order
//! itself is not configurable.

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::duplicate::{DuplicateDetector, DuplicateVerdict, FingerprintId};
use super::memory::{self, MemoryPressure};
use super::rate_limit::RateLimiter;
use super::session::{Session, SessionKey, SessionStore};
use super::threat::ThreatMonitor;
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::event::{Decision, InboundEvent, RejectReason, Severity};
use crate::telemetry::metrics::stages;
use crate::telemetry::Metrics;

/// Threat-evaluation capability of the first pipeline stage.
pub trait ThreatGate: Send + Sync {
    fn check_security(&self, event: &InboundEvent) -> Decision;
    fn block(&self, _customer_id: &str, _duration: Duration) {}
    fn unblock(&self, _customer_id: &str) -> bool {
        false
    }
    fn whitelist(&self, _customer_id: &str) {}
    fn unwhitelist(&self, _customer_id: &str) -> bool {
        false
    }
    fn sweep(&self) {}
    fn clear_histories(&self) {}
    fn stats(&self) -> Value {
        Value::Null
    }
    fn shutdown(&self) {}
}

/// Request-volume capability of the second pipeline stage.
pub trait RateGate: Send + Sync {
    fn check(&self, event: &InboundEvent) -> Decision;
    fn block(&self, _customer_id: &str, _duration: Duration) {}
    fn unblock(&self, _customer_id: &str) -> bool {
        false
    }
    fn sweep(&self) {}
    fn clear_histories(&self) {}
    fn stats(&self) -> Value {
        Value::Null
    }
    fn shutdown(&self) {}
}

/// Duplicate-suppression capability of the third pipeline stage.
pub trait DuplicateGate: Send + Sync {
    fn should_process(&self, event: &InboundEvent) -> DuplicateVerdict;
    fn complete(&self, _fingerprint: FingerprintId) {}
    fn sweep(&self) {}
    fn clear_histories(&self) {}
    fn stats(&self) -> Value {
        Value::Null
    }
    fn shutdown(&self) {}
}

impl ThreatGate for ThreatMonitor {
    fn check_security(&self, event: &InboundEvent) -> Decision {
        ThreatMonitor::check_security(self, event)
    }
    fn block(&self, customer_id: &str, duration: Duration) {
        ThreatMonitor::block(self, customer_id, duration);
    }
    fn unblock(&self, customer_id: &str) -> bool {
        ThreatMonitor::unblock(self, customer_id)
    }
    fn whitelist(&self, customer_id: &str) {
        ThreatMonitor::whitelist(self, customer_id);
    }
    fn unwhitelist(&self, customer_id: &str) -> bool {
        ThreatMonitor::unwhitelist(self, customer_id)
    }
    fn sweep(&self) {
        ThreatMonitor::sweep(self);
    }
    fn clear_histories(&self) {
        ThreatMonitor::clear_histories(self);
    }
    fn stats(&self) -> Value {
        serde_json::to_value(ThreatMonitor::stats(self)).unwrap_or(Value::Null)
    }
    fn shutdown(&self) {
        ThreatMonitor::shutdown(self);
    }
}

impl RateGate for RateLimiter {
    fn check(&self, event: &InboundEvent) -> Decision {
        RateLimiter::check(self, event)
    }
    fn block(&self, customer_id: &str, duration: Duration) {
        RateLimiter::block(self, customer_id, duration);
    }
    fn unblock(&self, customer_id: &str) -> bool {
        RateLimiter::unblock(self, customer_id)
    }
    fn sweep(&self) {
        RateLimiter::sweep(self);
    }
    fn clear_histories(&self) {
        RateLimiter::clear_histories(self);
    }
    fn stats(&self) -> Value {
        serde_json::to_value(RateLimiter::stats(self)).unwrap_or(Value::Null)
    }
    fn shutdown(&self) {
        RateLimiter::shutdown(self);
    }
}

impl DuplicateGate for DuplicateDetector {
    fn should_process(&self, event: &InboundEvent) -> DuplicateVerdict {
        DuplicateDetector::should_process(self, event)
    }
    fn complete(&self, fingerprint: FingerprintId) {
        DuplicateDetector::complete(self, fingerprint);
    }
    fn sweep(&self) {
        DuplicateDetector::sweep(self);
    }
    fn clear_histories(&self) {
        DuplicateDetector::clear_histories(self);
    }
    fn stats(&self) -> Value {
        serde_json::to_value(DuplicateDetector::stats(self)).unwrap_or(Value::Null)
    }
    fn shutdown(&self) {
        DuplicateDetector::shutdown(self);
    }
}

/// Gate that admits everything. Useful for deployments that disable a
/// stage and for tests that exercise a single stage in isolation.
pub struct NoopThreatGate;

impl ThreatGate for NoopThreatGate {
    fn check_security(&self, _event: &InboundEvent) -> Decision {
        Decision::allowed()
    }
}

pub struct NoopRateGate;

impl RateGate for NoopRateGate {
    fn check(&self, _event: &InboundEvent) -> Decision {
        Decision::allowed()
    }
}

pub struct NoopDuplicateGate;

impl DuplicateGate for NoopDuplicateGate {
    fn should_process(&self, _event: &InboundEvent) -> DuplicateVerdict {
        DuplicateVerdict::Fresh { fingerprint: None }
    }
}

/// An event that cleared every gate, paired with its live session.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub event: InboundEvent,
    pub session: Session,
    pub key: SessionKey,
    pub fingerprint: Option<FingerprintId>,
    pub severity: Option<Severity>,
}

/// Aggregate stats snapshot across all four components.
#[derive(Debug, Clone, Serialize)]
pub struct GateStats {
    pub threat: Value,
    pub rate_limit: Value,
    pub duplicates: Value,
    pub sessions: Value,
}

pub struct AdmissionPipeline {
    threat: Arc<dyn ThreatGate>,
    rate: Arc<dyn RateGate>,
    duplicates: Arc<dyn DuplicateGate>,
    sessions: Arc<SessionStore>,
    metrics: Option<Arc<Metrics>>,
    // Last session count reported to the active-sessions gauge.
    sessions_reported: AtomicI64,
}

impl AdmissionPipeline {
    /// Build the full pipeline from config, every gate enabled.
    pub fn new(config: &Config) -> Self {
        Self {
            threat: Arc::new(ThreatMonitor::new(config.threat.clone())),
            rate: Arc::new(RateLimiter::new(config.limits.clone())),
            duplicates: Arc::new(DuplicateDetector::new(config.duplicates.clone())),
            sessions: Arc::new(SessionStore::new(config.sessions.clone())),
            metrics: None,
            sessions_reported: AtomicI64::new(0),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_threat_gate(mut self, gate: Arc<dyn ThreatGate>) -> Self {
        self.threat = gate;
        self
    }

    pub fn with_rate_gate(mut self, gate: Arc<dyn RateGate>) -> Self {
        self.rate = gate;
        self
    }

    pub fn with_duplicate_gate(mut self, gate: Arc<dyn DuplicateGate>) -> Self {
        self.duplicates = gate;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run one event through every gate in order.
    ///
    /// The first rejection short-circuits and is returned as `Err`; an
    /// admitted event comes back with its live session and, when the
    /// duplicate gate recorded one, the processing fingerprint to release
    /// via `complete` or `finish_order`.
    pub fn admit(&self, event: InboundEvent) -> std::result::Result<Admitted, Decision> {
        let start = Instant::now();
        if let Some(m) = &self.metrics {
            m.record_event(&event.tenant_id);
        }

        if let Err(e) = event.validate() {
            debug!(error = %e, "invalid inbound event");
            let decision = Decision::rejected(RejectReason::InvalidEvent);
            self.record_rejection(stages::VALIDATION, &decision, start);
            return Err(decision);
        }

        let decision = self.threat.check_security(&event);
        if decision.is_rejected() {
            self.record_rejection(stages::THREAT, &decision, start);
            return Err(decision);
        }
        let severity = decision.severity();

        let decision = self.rate.check(&event);
        if decision.is_rejected() {
            self.record_rejection(stages::RATE_LIMIT, &decision, start);
            return Err(decision);
        }

        let verdict = self.duplicates.should_process(&event);
        if let Some(reason) = verdict.reason() {
            // Duplicates are dropped silently; no user message goes out.
            let decision = Decision::rejected(reason);
            self.record_rejection(stages::DUPLICATE, &decision, start);
            return Err(decision);
        }
        let fingerprint = verdict.fingerprint();

        let key = SessionKey::new(event.customer_id.clone(), event.tenant_id.clone());
        let session = match self.sessions.get(&key) {
            Some(session) => session,
            None => {
                if let Some(m) = &self.metrics {
                    m.record_session_created();
                }
                self.sessions.create(key.clone())
            }
        };

        if let Some(m) = &self.metrics {
            m.record_admitted(start.elapsed().as_secs_f64());
        }
        self.sync_sessions_gauge();
        Ok(Admitted { event, session, key, fingerprint, severity })
    }

    /// Keep the active-sessions gauge equal to the store's count. Sessions
    /// also leave the store through lazy expiry and sweeps, so the gauge is
    /// reconciled rather than counted up and down per event.
    fn sync_sessions_gauge(&self) {
        let Some(m) = &self.metrics else {
            return;
        };
        let current = self.sessions.len() as i64;
        let previous = self.sessions_reported.swap(current, Ordering::Relaxed);
        m.adjust_sessions_active(current - previous);
    }

    fn record_rejection(&self, stage: &str, decision: &Decision, start: Instant) {
        if let Some(m) = &self.metrics {
            let reason = decision.reason().map_or("unknown", |r| r.as_str());
            m.record_rejected(stage, reason, start.elapsed().as_secs_f64());
        }
    }

    /// Finish a non-terminal handling round: write the session back and
    /// release the duplicate-processing fingerprint.
    pub fn complete(&self, admitted: &Admitted, session: Session) {
        self.sessions.update(&admitted.key, session);
        if let Some(fp) = admitted.fingerprint {
            self.duplicates.complete(fp);
        }
        self.sync_sessions_gauge();
    }

    /// Terminal action: a confirmed order deletes the session so the next
    /// message starts a fresh conversation at the menu.
    pub fn finish_order(&self, admitted: &Admitted, session: &Session) -> Result<()> {
        if !session.step.can_complete_order() {
            return Err(GateError::InvalidTransition {
                from: session.step,
                to: session.step,
            });
        }
        if self.sessions.delete(&admitted.key) {
            if let Some(m) = &self.metrics {
                m.record_order_completed();
            }
            self.sync_sessions_gauge();
        }
        if let Some(fp) = admitted.fingerprint {
            self.duplicates.complete(fp);
        }
        info!(
            customer = %admitted.key.customer_id,
            tenant = %admitted.key.tenant_id,
            total_cents = session.cart_total_cents(),
            "order completed, session closed"
        );
        Ok(())
    }

    /// Release an admitted event's fingerprint without touching the
    /// session. Used when the handler fails before producing a session
    /// update.
    pub fn release(&self, admitted: &Admitted) {
        if let Some(fp) = admitted.fingerprint {
            self.duplicates.complete(fp);
        }
    }

    /// One periodic maintenance round across every component, plus the
    /// memory-pressure reaction.
    pub fn sweep(&self) {
        self.threat.sweep();
        self.rate.sweep();
        self.duplicates.sweep();
        let evicted = self.sessions.sweep();
        if let Some(m) = &self.metrics {
            m.record_sweep_evictions("sessions", evicted as u64);
        }
        self.sync_sessions_gauge();

        let Some(resident) = memory::process_memory_bytes() else {
            return;
        };
        match memory::pressure(resident, self.sessions.memory_config()) {
            MemoryPressure::Normal => {}
            MemoryPressure::Warning => {
                let evicted = self.sessions.evict_idle(self.sessions.idle_timeout() / 2);
                warn!(resident, evicted, "memory pressure warning, evicted idle sessions");
                if let Some(m) = &self.metrics {
                    m.record_sweep_evictions("sessions_pressure", evicted as u64);
                }
            }
            MemoryPressure::Critical => {
                let evicted = self.sessions.evict_idle(self.sessions.idle_timeout() / 2);
                self.rate.clear_histories();
                self.duplicates.clear_histories();
                warn!(
                    resident,
                    evicted,
                    "memory pressure critical, cleared rate and duplicate histories"
                );
                if let Some(m) = &self.metrics {
                    m.record_sweep_evictions("sessions_pressure", evicted as u64);
                }
            }
        }
        self.sync_sessions_gauge();
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            threat: self.threat.stats(),
            rate_limit: self.rate.stats(),
            duplicates: self.duplicates.stats(),
            sessions: serde_json::to_value(self.sessions.stats()).unwrap_or(Value::Null),
        }
    }

    // Administrative surface, forwarded to the gates.

    pub fn block_customer(&self, customer_id: &str, duration: Duration) {
        self.rate.block(customer_id, duration);
        if let Some(m) = &self.metrics {
            m.record_block("rate_limit");
        }
    }

    pub fn unblock_customer(&self, customer_id: &str) -> bool {
        let rate = self.rate.unblock(customer_id);
        let threat = self.threat.unblock(customer_id);
        rate || threat
    }

    pub fn whitelist_customer(&self, customer_id: &str) {
        self.threat.whitelist(customer_id);
    }

    pub fn unwhitelist_customer(&self, customer_id: &str) -> bool {
        self.threat.unwhitelist(customer_id)
    }

    /// Log final stats and tear every component down.
    pub fn shutdown(&self) {
        match serde_json::to_string(&self.stats()) {
            Ok(stats) => info!(stats = %stats, "admission pipeline shutting down"),
            Err(_) => info!("admission pipeline shutting down"),
        }
        self.threat.shutdown();
        self.rate.shutdown();
        self.duplicates.shutdown();
        self.sessions.shutdown();
    }
}
