use ahash::{AHashMap, AHashSet, RandomState};
use serde::Serialize;
use std::collections::VecDeque;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::behavior::analyze_behavior;
use super::content::analyze_content;
use crate::admission::duplicate::similarity;
use crate::admission::rate_limit::BlockRecord;
use crate::config::ThreatConfig;
use crate::event::{Decision, InboundEvent, RejectReason, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Content,
    Behavior,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    ShortWindowRate,
    MediumWindowRate,
    Overlong,
    SuspiciousKeyword,
    InjectionPattern,
    NonPrintable,
    IdenticalFlood,
    CommandFlood,
    BotTiming,
    CoordinatedPattern,
}

/// One analysis result for the current evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    pub kind: ViolationKind,
}

impl Finding {
    /// Severity-weighted risk points: content {1,3,5}, behavior {2,4,6},
    /// pattern {1,2,4}. Critical never originates from an analysis, so it
    /// weighs like high.
    pub fn weight(&self) -> u32 {
        match (self.category, self.severity) {
            (Category::Content, Severity::Low) => 1,
            (Category::Content, Severity::Medium) => 3,
            (Category::Content, _) => 5,
            (Category::Behavior, Severity::Low) => 2,
            (Category::Behavior, Severity::Medium) => 4,
            (Category::Behavior, _) => 6,
            (Category::Pattern, Severity::Low) => 1,
            (Category::Pattern, Severity::Medium) => 2,
            (Category::Pattern, _) => 4,
        }
    }
}

/// Per-message metadata kept for behavioral analysis.
#[derive(Debug, Clone, Copy)]
pub(super) struct MsgMeta {
    pub at: Instant,
    pub hash: u64,
    #[allow(dead_code)]
    pub len: usize,
    pub is_command: bool,
}

/// Accumulated state for one customer.
#[derive(Debug)]
struct ThreatRecord {
    violations: VecDeque<(Instant, ViolationKind)>,
    risk: f64,
    last_activity: Instant,
    recent: VecDeque<MsgMeta>,
}

impl ThreatRecord {
    fn new(now: Instant) -> Self {
        Self { violations: VecDeque::new(), risk: 0.0, last_activity: now, recent: VecDeque::new() }
    }
}

#[derive(Debug)]
struct PatternEntry {
    customer_id: String,
    text: String,
    chars: usize,
    hash: u64,
    at: Instant,
}

#[derive(Default)]
struct MonitorState {
    records: AHashMap<String, ThreatRecord>,
    blocks: AHashMap<String, BlockRecord>,
    whitelist: AHashSet<String>,
    tenant_recent: AHashMap<String, VecDeque<PatternEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatStats {
    pub tracked_customers: usize,
    pub blocked_customers: usize,
    pub whitelisted: usize,
    pub recent_violations: usize,
    pub high_risk_customers: usize,
}

const RECENT_CAP: usize = 64;
const TENANT_RECENT_CAP: usize = 128;
const RISK_DECAY: f64 = 0.8;
const RISK_MAX: f64 = 100.0;
const HIGH_RISK: f64 = 50.0;
const PATTERN_SIMILARITY: f64 = 0.8;
// Texts longer than this are grouped by hash only; the edit-distance scan
// is quadratic and runs under the monitor's lock.
const PATTERN_SIMILARITY_MAX_LEN: usize = 512;

/// Content + behavioral risk scoring with whitelisting and temporary
/// blocking.
pub struct ThreatMonitor {
    config: ThreatConfig,
    hasher: RandomState,
    state: RwLock<MonitorState>,
}

impl ThreatMonitor {
    pub fn new(config: ThreatConfig) -> Self {
        let mut whitelist = AHashSet::new();
        for customer in &config.whitelist {
            whitelist.insert(customer.clone());
        }
        Self {
            config,
            hasher: RandomState::new(),
            state: RwLock::new(MonitorState { whitelist, ..MonitorState::default() }),
        }
    }

    fn text_hash(&self, text: &str) -> u64 {
        let mut h = self.hasher.build_hasher();
        text.hash(&mut h);
        h.finish()
    }

    /// Evaluate one inbound event.
    ///
    /// Whitelisted customers bypass everything; blocked customers are
    /// rejected without re-evaluation. Otherwise the four analyses run, the
    /// weighted delta updates the decaying risk score, and critical events
    /// or accumulated violations escalate into a block.
    pub fn check_security(&self, event: &InboundEvent) -> Decision {
        let now = event.received_at;
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("threat monitor lock poisoned, rejecting conservatively");
                return Decision::rejected(RejectReason::InternalError);
            }
        };

        if state.whitelist.contains(&event.customer_id) {
            return Decision::allowed();
        }

        if let Some(block) = state.blocks.get(&event.customer_id) {
            if block.expires_at > now {
                let expires_at = block.expires_at;
                return Decision::rejected(RejectReason::ThreatBlocked)
                    .with_severity(Severity::High)
                    .with_retry_at(expires_at)
                    .with_user_message("Your access is temporarily restricted.");
            }
            state.blocks.remove(&event.customer_id);
            debug!(customer = %event.customer_id, "threat block expired, removed");
        }

        let text_hash = self.text_hash(&event.text);
        let text_chars = event.text.chars().count();
        let medium_window = self.config.medium_window();

        let record = state
            .records
            .entry(event.customer_id.clone())
            .or_insert_with(|| ThreatRecord::new(now));
        record.recent.push_back(MsgMeta {
            at: now,
            hash: text_hash,
            len: text_chars,
            is_command: event.text.starts_with('/'),
        });
        while record.recent.len() > RECENT_CAP {
            record.recent.pop_front();
        }
        while let Some(front) = record.recent.front() {
            if now.saturating_duration_since(front.at) >= medium_window {
                record.recent.pop_front();
            } else {
                break;
            }
        }

        let mut findings = self.rate_findings(record, now);
        findings.extend(analyze_content(&event.text, &self.config));
        findings.extend(analyze_behavior(&record.recent, now, &self.config));

        // Cross-customer convergence needs the tenant history, recorded
        // before analysis so the current message participates in grouping.
        Self::record_tenant(
            &mut state,
            event,
            text_hash,
            text_chars,
            now,
            self.config.pattern_window(),
        );
        if let Some(finding) = self.pattern_finding(&state, event, text_hash, text_chars, now) {
            findings.push(finding);
        }

        let delta: u32 = findings.iter().map(Finding::weight).sum();
        let severity = self.classify(delta);

        let Some(record) = state.records.get_mut(&event.customer_id) else {
            // Entry was created earlier in this call; treat a miss as an
            // internal inconsistency and fail only this event.
            return Decision::rejected(RejectReason::InternalError);
        };
        record.risk = (delta as f64 + record.risk * RISK_DECAY).min(RISK_MAX);
        record.last_activity = now;
        for finding in &findings {
            record.violations.push_back((now, finding.kind));
        }
        while let Some(&(at, _)) = record.violations.front() {
            if now.saturating_duration_since(at) >= medium_window {
                record.violations.pop_front();
            } else {
                break;
            }
        }
        let violation_count = record.violations.len();
        let risk = record.risk;

        if severity == Some(Severity::Critical) || violation_count >= self.config.violation_limit {
            let duration = self.block_duration(risk);
            let expires_at = now + duration;
            state.blocks.insert(
                event.customer_id.clone(),
                BlockRecord {
                    expires_at,
                    violations: violation_count,
                    reason: RejectReason::ThreatCritical,
                },
            );
            info!(
                customer = %event.customer_id,
                tenant = %event.tenant_id,
                delta,
                risk,
                violations = violation_count,
                block_ms = duration.as_millis() as u64,
                "critical threat, blocking customer"
            );
            return Decision::rejected(RejectReason::ThreatCritical)
                .with_severity(Severity::Critical)
                .with_retry_at(expires_at)
                .with_user_message("Your access is temporarily restricted.");
        }

        if severity == Some(Severity::High) {
            warn!(
                customer = %event.customer_id,
                tenant = %event.tenant_id,
                delta,
                risk,
                "high-severity threat findings, allowing with flag"
            );
            return Decision::flagged(Severity::High);
        }

        Decision::allowed()
    }

    /// The monitor's own rate model, deliberately separate from the rate
    /// limiter: a message can be rate-limited and threat-flagged for
    /// different reasons.
    fn rate_findings(&self, record: &ThreatRecord, now: Instant) -> Vec<Finding> {
        let mut findings = Vec::new();
        let short = record
            .recent
            .iter()
            .filter(|m| now.saturating_duration_since(m.at) < self.config.short_window())
            .count();
        if short > self.config.short_max {
            findings.push(Finding {
                category: Category::Behavior,
                severity: Severity::Medium,
                kind: ViolationKind::ShortWindowRate,
            });
        }
        if record.recent.len() > self.config.medium_max {
            findings.push(Finding {
                category: Category::Behavior,
                severity: Severity::Low,
                kind: ViolationKind::MediumWindowRate,
            });
        }
        findings
    }

    fn record_tenant(
        state: &mut MonitorState,
        event: &InboundEvent,
        text_hash: u64,
        text_chars: usize,
        now: Instant,
        pattern_window: Duration,
    ) {
        let entries = state
            .tenant_recent
            .entry(event.tenant_id.clone())
            .or_default();
        entries.push_back(PatternEntry {
            customer_id: event.customer_id.clone(),
            text: event.text.clone(),
            chars: text_chars,
            hash: text_hash,
            at: now,
        });
        while entries.len() > TENANT_RECENT_CAP {
            entries.pop_front();
        }
        while let Some(front) = entries.front() {
            if now.saturating_duration_since(front.at) >= pattern_window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Distinct customers converging on near-identical content within the
    /// pattern window.
    fn pattern_finding(
        &self,
        state: &MonitorState,
        event: &InboundEvent,
        text_hash: u64,
        text_chars: usize,
        now: Instant,
    ) -> Option<Finding> {
        let entries = state.tenant_recent.get(&event.tenant_id)?;
        let window = self.config.pattern_window();
        let mut customers: Vec<&str> = Vec::new();
        for entry in entries.iter().rev() {
            if now.saturating_duration_since(entry.at) >= window {
                break;
            }
            let matches = entry.hash == text_hash
                || (text_chars <= PATTERN_SIMILARITY_MAX_LEN
                    && entry.chars <= PATTERN_SIMILARITY_MAX_LEN
                    && similarity(&entry.text, &event.text) >= PATTERN_SIMILARITY);
            if matches && !customers.contains(&entry.customer_id.as_str()) {
                customers.push(&entry.customer_id);
            }
        }
        if customers.len() >= self.config.pattern_min_customers {
            Some(Finding {
                category: Category::Pattern,
                severity: Severity::High,
                kind: ViolationKind::CoordinatedPattern,
            })
        } else {
            None
        }
    }

    /// Thresholds apply to the combined delta of this evaluation, not the
    /// running score.
    fn classify(&self, delta: u32) -> Option<Severity> {
        if delta >= self.config.critical_delta {
            Some(Severity::Critical)
        } else if delta >= self.config.high_delta {
            Some(Severity::High)
        } else if delta >= self.config.medium_delta {
            Some(Severity::Medium)
        } else if delta > 0 {
            Some(Severity::Low)
        } else {
            None
        }
    }

    /// Block duration scales with the running risk score, capped.
    fn block_duration(&self, risk: f64) -> Duration {
        let scaled = self.config.block_base().as_secs_f64() * (1.0 + risk / 25.0);
        Duration::from_secs_f64(scaled).min(self.config.block_max())
    }

    pub fn whitelist(&self, customer_id: &str) {
        if let Ok(mut state) = self.state.write() {
            state.whitelist.insert(customer_id.to_string());
        }
    }

    pub fn unwhitelist(&self, customer_id: &str) -> bool {
        match self.state.write() {
            Ok(mut state) => state.whitelist.remove(customer_id),
            Err(_) => false,
        }
    }

    pub fn block(&self, customer_id: &str, duration: Duration) {
        if let Ok(mut state) = self.state.write() {
            state.blocks.insert(
                customer_id.to_string(),
                BlockRecord {
                    expires_at: Instant::now() + duration,
                    violations: 0,
                    reason: RejectReason::ThreatBlocked,
                },
            );
        }
    }

    pub fn unblock(&self, customer_id: &str) -> bool {
        match self.state.write() {
            Ok(mut state) => state.blocks.remove(customer_id).is_some(),
            Err(_) => false,
        }
    }

    pub fn is_blocked(&self, customer_id: &str) -> bool {
        match self.state.read() {
            Ok(state) => state
                .blocks
                .get(customer_id)
                .is_some_and(|b| b.expires_at > Instant::now()),
            Err(_) => false,
        }
    }

    /// Current running risk score, if the customer is tracked.
    pub fn risk_score(&self, customer_id: &str) -> Option<f64> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.records.get(customer_id).map(|r| r.risk))
    }

    /// Periodic sweep: decay idle risk scores, drop cold records, expired
    /// blocks and stale tenant history.
    pub fn sweep(&self) {
        let now = Instant::now();
        let Ok(mut state) = self.state.write() else {
            return;
        };

        let medium_window = self.config.medium_window();
        state.records.retain(|_, record| {
            if now.saturating_duration_since(record.last_activity) >= medium_window {
                record.risk *= RISK_DECAY;
            }
            while let Some(front) = record.recent.front() {
                if now.saturating_duration_since(front.at) >= medium_window {
                    record.recent.pop_front();
                } else {
                    break;
                }
            }
            while let Some(&(at, _)) = record.violations.front() {
                if now.saturating_duration_since(at) >= medium_window {
                    record.violations.pop_front();
                } else {
                    break;
                }
            }
            record.risk >= 0.1 || !record.recent.is_empty() || !record.violations.is_empty()
        });

        state.blocks.retain(|_, b| b.expires_at > now);

        let pattern_window = self.config.pattern_window();
        state.tenant_recent.retain(|_, entries| {
            while let Some(front) = entries.front() {
                if now.saturating_duration_since(front.at) >= pattern_window {
                    entries.pop_front();
                } else {
                    break;
                }
            }
            !entries.is_empty()
        });
    }

    /// Drop behavioral histories but keep risk scores, blocks and the
    /// whitelist. Used by the emergency memory-pressure sweep.
    pub fn clear_histories(&self) {
        if let Ok(mut state) = self.state.write() {
            for record in state.records.values_mut() {
                record.recent.clear();
            }
            state.tenant_recent.clear();
        }
    }

    pub fn stats(&self) -> ThreatStats {
        let now = Instant::now();
        match self.state.read() {
            Ok(state) => ThreatStats {
                tracked_customers: state.records.len(),
                // Expired blocks linger until lazily removed; don't count
                // them.
                blocked_customers: state
                    .blocks
                    .values()
                    .filter(|b| b.expires_at > now)
                    .count(),
                whitelisted: state.whitelist.len(),
                recent_violations: state.records.values().map(|r| r.violations.len()).sum(),
                high_risk_customers: state
                    .records
                    .values()
                    .filter(|r| r.risk >= HIGH_RISK)
                    .count(),
            },
            Err(_) => ThreatStats {
                tracked_customers: 0,
                blocked_customers: 0,
                whitelisted: 0,
                recent_violations: 0,
                high_risk_customers: 0,
            },
        }
    }

    pub fn shutdown(&self) {
        let stats = self.stats();
        info!(
            tracked_customers = stats.tracked_customers,
            blocked_customers = stats.blocked_customers,
            high_risk_customers = stats.high_risk_customers,
            "threat monitor shutting down"
        );
        if let Ok(mut state) = self.state.write() {
            let whitelist = std::mem::take(&mut state.whitelist);
            *state = MonitorState { whitelist, ..MonitorState::default() };
        }
    }
}
