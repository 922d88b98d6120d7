use ahash::{AHashMap, RandomState};
use serde::Serialize;
use std::collections::VecDeque;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::patterns;
use super::patterns::{CoordinatedSpam, SpamSignal};
use super::similarity::similarity;
use crate::config::DuplicateConfig;
use crate::event::{InboundEvent, RejectReason};

/// Opaque handle to a content fingerprint's processing lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintId(u64);

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateVerdict {
    /// Not a duplicate; the message was recorded and locked for processing.
    /// Call `complete` with the fingerprint once handling finishes.
    Fresh { fingerprint: Option<FingerprintId> },
    /// A duplicate or coordinated-spam match; the message must not reach
    /// business logic.
    Duplicate { reason: RejectReason },
}

impl DuplicateVerdict {
    pub fn should_process(&self) -> bool {
        matches!(self, DuplicateVerdict::Fresh { .. })
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            DuplicateVerdict::Duplicate { reason } => Some(*reason),
            DuplicateVerdict::Fresh { .. } => None,
        }
    }

    pub fn fingerprint(&self) -> Option<FingerprintId> {
        match self {
            DuplicateVerdict::Fresh { fingerprint } => *fingerprint,
            DuplicateVerdict::Duplicate { .. } => None,
        }
    }
}

/// A recorded content hash with its processing lock.
#[derive(Debug)]
struct ContentFingerprint {
    seen_at: Instant,
    message_id: String,
    processing_since: Option<Instant>,
}

#[derive(Debug)]
pub(crate) struct HistoryEntry {
    pub text: String,
    pub chars: usize,
    pub hash: u64,
    pub at: Instant,
}

#[derive(Debug)]
pub(crate) struct TenantEntry {
    pub customer_id: String,
    pub text: String,
    pub chars: usize,
    pub hash: u64,
    pub at: Instant,
}

#[derive(Default)]
struct DetectorState {
    fingerprints: AHashMap<u64, ContentFingerprint>,
    message_ids: AHashMap<String, Instant>,
    customer_history: AHashMap<String, VecDeque<HistoryEntry>>,
    tenant_history: AHashMap<String, VecDeque<TenantEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateStats {
    pub fingerprints: usize,
    pub processing: usize,
    pub tracked_customers: usize,
    pub tracked_tenants: usize,
}

/// Exact and near-duplicate detection over bounded message histories.
pub struct DuplicateDetector {
    config: DuplicateConfig,
    hasher: RandomState,
    state: RwLock<DetectorState>,
}

impl DuplicateDetector {
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config, hasher: RandomState::new(), state: RwLock::new(DetectorState::default()) }
    }

    fn content_hash(&self, customer_id: &str, tenant_id: &str, text: &str) -> u64 {
        let mut h = self.hasher.build_hasher();
        customer_id.hash(&mut h);
        tenant_id.hash(&mut h);
        text.hash(&mut h);
        h.finish()
    }

    fn tenant_hash(&self, tenant_id: &str, text: &str) -> u64 {
        let mut h = self.hasher.build_hasher();
        tenant_id.hash(&mut h);
        text.hash(&mut h);
        h.finish()
    }

    /// Decide whether this message should reach business logic.
    ///
    /// Checks run in order, cheapest first; the first positive
    /// short-circuits. A clean message is recorded into the per-customer and
    /// per-tenant histories and locked for processing.
    pub fn should_process(&self, event: &InboundEvent) -> DuplicateVerdict {
        let now = event.received_at;
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("duplicate detector lock poisoned, rejecting conservatively");
                return DuplicateVerdict::Duplicate { reason: RejectReason::InternalError };
            }
        };

        let exact_window = self.config.exact_window();
        if let Some(&seen) = state.message_ids.get(&event.message_id) {
            if now.saturating_duration_since(seen) < exact_window {
                debug!(message_id = %event.message_id, "duplicate message id");
                return DuplicateVerdict::Duplicate { reason: RejectReason::ExactMessageId };
            }
            state.message_ids.remove(&event.message_id);
        }

        let hash = self.content_hash(&event.customer_id, &event.tenant_id, &event.text);
        if let Some(fp) = state.fingerprints.get(&hash) {
            if now.saturating_duration_since(fp.seen_at) < exact_window {
                let processing = fp
                    .processing_since
                    .is_some_and(|since| {
                        now.saturating_duration_since(since) < self.config.processing_timeout()
                    });
                let reason = if processing {
                    RejectReason::CurrentlyProcessing
                } else {
                    RejectReason::ExactContent
                };
                debug!(
                    customer = %event.customer_id,
                    original = %fp.message_id,
                    reason = reason.as_str(),
                    "exact content duplicate"
                );
                return DuplicateVerdict::Duplicate { reason };
            }
        }

        // The edit-distance scan is quadratic and runs under the write lock,
        // so it is bounded on both ends: texts outside
        // [min_similarity_len, max_similarity_len] are matched by exact
        // checks only.
        let text_chars = event.text.chars().count();
        let scan_similarity = text_chars >= self.config.min_similarity_len
            && text_chars <= self.config.max_similarity_len;

        let history_window = self.config.history_window();
        if let Some(history) = state.customer_history.get(&event.customer_id) {
            for entry in history.iter().rev() {
                if now.saturating_duration_since(entry.at) >= history_window {
                    break;
                }
                if entry.text == event.text {
                    return DuplicateVerdict::Duplicate { reason: RejectReason::CustomerRepeat };
                }
                if scan_similarity
                    && entry.chars <= self.config.max_similarity_len
                    && similarity(&entry.text, &event.text) >= self.config.similarity_threshold
                {
                    return DuplicateVerdict::Duplicate { reason: RejectReason::CustomerSimilar };
                }
            }
        }

        let tenant_text_hash = self.tenant_hash(&event.tenant_id, &event.text);
        if let Some(verdict) =
            self.check_tenant_spam(&state, event, tenant_text_hash, scan_similarity, now)
        {
            return verdict;
        }

        self.record(&mut state, event, text_chars, hash, tenant_text_hash, now);
        DuplicateVerdict::Fresh { fingerprint: Some(FingerprintId(hash)) }
    }

    /// Tenant-wide coordinated check over *other* customers' recent
    /// messages; the same customer is covered by the per-customer scan.
    fn check_tenant_spam(
        &self,
        state: &DetectorState,
        event: &InboundEvent,
        tenant_text_hash: u64,
        scan_similarity: bool,
        now: Instant,
    ) -> Option<DuplicateVerdict> {
        let history = state.tenant_history.get(&event.tenant_id)?;
        let history_window = self.config.history_window();

        let mut identical = 0usize;
        let mut similar_customers: Vec<&str> = Vec::new();

        for entry in history.iter().rev() {
            if now.saturating_duration_since(entry.at) >= history_window {
                break;
            }
            if entry.customer_id == event.customer_id {
                continue;
            }
            if entry.hash == tenant_text_hash && entry.text == event.text {
                identical += 1;
            } else if scan_similarity
                && entry.chars <= self.config.max_similarity_len
                && similarity(&entry.text, &event.text) >= self.config.similarity_threshold
                && !similar_customers.contains(&entry.customer_id.as_str())
            {
                similar_customers.push(&entry.customer_id);
            }
        }

        if identical >= self.config.identical_threshold {
            info!(
                tenant = %event.tenant_id,
                identical,
                "tenant-wide identical spam detected"
            );
            return Some(DuplicateVerdict::Duplicate {
                reason: RejectReason::BusinessSpamIdentical,
            });
        }
        if similar_customers.len() >= self.config.similar_threshold {
            info!(
                tenant = %event.tenant_id,
                customers = similar_customers.len(),
                "tenant-wide near-identical spam detected"
            );
            return Some(DuplicateVerdict::Duplicate { reason: RejectReason::BusinessSpamSimilar });
        }
        None
    }

    fn record(
        &self,
        state: &mut DetectorState,
        event: &InboundEvent,
        text_chars: usize,
        hash: u64,
        tenant_text_hash: u64,
        now: Instant,
    ) {
        state.message_ids.insert(event.message_id.clone(), now);
        state.fingerprints.insert(
            hash,
            ContentFingerprint {
                seen_at: now,
                message_id: event.message_id.clone(),
                processing_since: Some(now),
            },
        );

        let customer_cap = self.config.customer_history;
        let history = state
            .customer_history
            .entry(event.customer_id.clone())
            .or_default();
        if history.len() >= customer_cap {
            history.pop_front();
        }
        history.push_back(HistoryEntry {
            text: event.text.clone(),
            chars: text_chars,
            hash,
            at: now,
        });

        let tenant_cap = self.config.tenant_history;
        let tenant = state
            .tenant_history
            .entry(event.tenant_id.clone())
            .or_default();
        if tenant.len() >= tenant_cap {
            tenant.pop_front();
        }
        tenant.push_back(TenantEntry {
            customer_id: event.customer_id.clone(),
            text: event.text.clone(),
            chars: text_chars,
            hash: tenant_text_hash,
            at: now,
        });
    }

    /// Release a processing lock. Missing the call is tolerated: the lock
    /// goes stale after `processing_timeout` anyway.
    pub fn complete(&self, fingerprint: FingerprintId) {
        if let Ok(mut state) = self.state.write() {
            if let Some(fp) = state.fingerprints.get_mut(&fingerprint.0) {
                fp.processing_since = None;
            }
        }
    }

    /// Advisory per-customer spam signals. Never blocks by itself.
    pub fn detect_spam_patterns(&self, customer_id: &str) -> Vec<SpamSignal> {
        match self.state.read() {
            Ok(state) => state
                .customer_history
                .get(customer_id)
                .map(|h| patterns::spam_signals(h, &self.config))
                .unwrap_or_default(),
            Err(_) => vec![],
        }
    }

    /// Advisory tenant-wide convergence signal. Never blocks by itself.
    pub fn detect_coordinated_spam(&self, tenant_id: &str) -> Option<CoordinatedSpam> {
        match self.state.read() {
            Ok(state) => state
                .tenant_history
                .get(tenant_id)
                .and_then(|h| patterns::coordinated_spam(h, &self.config)),
            Err(_) => None,
        }
    }

    /// Periodic sweep: drop fingerprints, message ids and history entries
    /// that fell out of their windows.
    pub fn sweep(&self) {
        let now = Instant::now();
        let Ok(mut state) = self.state.write() else {
            return;
        };

        let exact_window = self.config.exact_window();
        state
            .fingerprints
            .retain(|_, fp| now.saturating_duration_since(fp.seen_at) < exact_window);
        state
            .message_ids
            .retain(|_, &mut seen| now.saturating_duration_since(seen) < exact_window);

        let history_window = self.config.history_window();
        state.customer_history.retain(|_, entries| {
            while let Some(front) = entries.front() {
                if now.saturating_duration_since(front.at) >= history_window {
                    entries.pop_front();
                } else {
                    break;
                }
            }
            !entries.is_empty()
        });
        state.tenant_history.retain(|_, entries| {
            while let Some(front) = entries.front() {
                if now.saturating_duration_since(front.at) >= history_window {
                    entries.pop_front();
                } else {
                    break;
                }
            }
            !entries.is_empty()
        });
    }

    /// Drop all histories and fingerprints. Used by the emergency
    /// memory-pressure sweep.
    pub fn clear_histories(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = DetectorState::default();
        }
    }

    pub fn stats(&self) -> DuplicateStats {
        match self.state.read() {
            Ok(state) => DuplicateStats {
                fingerprints: state.fingerprints.len(),
                processing: state
                    .fingerprints
                    .values()
                    .filter(|fp| fp.processing_since.is_some())
                    .count(),
                tracked_customers: state.customer_history.len(),
                tracked_tenants: state.tenant_history.len(),
            },
            Err(_) => DuplicateStats {
                fingerprints: 0,
                processing: 0,
                tracked_customers: 0,
                tracked_tenants: 0,
            },
        }
    }

    pub fn shutdown(&self) {
        let stats = self.stats();
        info!(
            fingerprints = stats.fingerprints,
            processing = stats.processing,
            "duplicate detector shutting down"
        );
        self.clear_histories();
    }
}
