use ahash::AHashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::window::RateWindow;
use crate::config::LimitsConfig;
use crate::event::{Decision, InboundEvent, RejectReason};

/// A temporary block placed on a customer after repeated violations.
///
/// Expired records are removed on next access, not merely ignored.
#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub expires_at: Instant,
    pub violations: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub active_customers: usize,
    pub active_tenants: usize,
    pub blocked_customers: usize,
    pub recent_violations: usize,
    pub global_count: usize,
}

#[derive(Default)]
struct LimiterState {
    customers: AHashMap<String, RateWindow>,
    bursts: AHashMap<String, RateWindow>,
    tenants: AHashMap<String, RateWindow>,
    global: RateWindow,
    violations: AHashMap<String, VecDeque<Instant>>,
    blocks: AHashMap<String, BlockRecord>,
}

/// Sliding-window request-volume control per customer, tenant and global
/// scope, with burst detection and escalating temporary blocks.
pub struct RateLimiter {
    config: LimitsConfig,
    state: RwLock<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: LimitsConfig) -> Self {
        Self { config, state: RwLock::new(LimiterState::default()) }
    }

    /// Check one inbound event against all scopes.
    ///
    /// An active block outranks everything and does not consume capacity.
    /// On an allowed outcome all scopes record the event. Only rejections
    /// the customer caused (customer and burst limits) count as violations
    /// toward a block; global and tenant congestion is not their fault.
    pub fn check(&self, event: &InboundEvent) -> Decision {
        let now = event.received_at;
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("rate limiter lock poisoned, rejecting conservatively");
                return Decision::rejected(RejectReason::InternalError);
            }
        };

        if let Some(block) = state.blocks.get(&event.customer_id) {
            if block.expires_at > now {
                let expires_at = block.expires_at;
                return Decision::rejected(RejectReason::RateBlocked)
                    .with_retry_at(expires_at)
                    .with_user_message(
                        "You are temporarily blocked from sending messages. Please try again later.",
                    );
            }
            state.blocks.remove(&event.customer_id);
            debug!(customer = %event.customer_id, "rate-limit block expired, removed");
        }

        state.global.prune(now, self.config.global_window());
        if state.global.len() >= self.config.global_max {
            let retry_at = state
                .global
                .oldest()
                .map(|oldest| oldest + self.config.global_window());
            return self.reject_over_capacity(
                &mut state,
                event,
                now,
                RejectReason::GlobalLimit,
                retry_at,
                "Service is busy right now, please try again shortly.",
            );
        }

        let tenant_window = self.config.tenant_window();
        let tenant = state
            .tenants
            .entry(event.tenant_id.clone())
            .or_insert_with(RateWindow::new);
        tenant.prune(now, tenant_window);
        if tenant.len() >= self.config.tenant_max {
            let retry_at = tenant.oldest().map(|oldest| oldest + tenant_window);
            return self.reject_over_capacity(
                &mut state,
                event,
                now,
                RejectReason::TenantLimit,
                retry_at,
                "This store is receiving a lot of messages, please retry in a moment.",
            );
        }

        let customer_window = self.config.customer_window();
        let customer = state
            .customers
            .entry(event.customer_id.clone())
            .or_insert_with(RateWindow::new);
        customer.prune(now, customer_window);
        if customer.len() >= self.config.customer_max {
            let retry_at = customer.oldest().map(|oldest| oldest + customer_window);
            return self.reject_over_capacity(
                &mut state,
                event,
                now,
                RejectReason::CustomerLimit,
                retry_at,
                "You are sending messages too quickly, please slow down.",
            );
        }

        let burst_window = self.config.burst_window();
        let burst = state
            .bursts
            .entry(event.customer_id.clone())
            .or_insert_with(RateWindow::new);
        burst.prune(now, burst_window);
        if burst.len() >= self.config.burst_max {
            let retry_at = burst.oldest().map(|oldest| oldest + burst_window);
            return self.reject_over_capacity(
                &mut state,
                event,
                now,
                RejectReason::BurstLimit,
                retry_at,
                "Please wait a moment before sending more messages.",
            );
        }

        state.global.record(now);
        if let Some(w) = state.tenants.get_mut(&event.tenant_id) {
            w.record(now);
        }
        if let Some(w) = state.customers.get_mut(&event.customer_id) {
            w.record(now);
        }
        if let Some(w) = state.bursts.get_mut(&event.customer_id) {
            w.record(now);
        }

        Decision::allowed()
    }

    fn reject_over_capacity(
        &self,
        state: &mut LimiterState,
        event: &InboundEvent,
        now: Instant,
        reason: RejectReason,
        retry_at: Option<Instant>,
        user_message: &str,
    ) -> Decision {
        let violations = match reason {
            RejectReason::CustomerLimit | RejectReason::BurstLimit => {
                self.record_violation(state, &event.customer_id, now, reason)
            }
            _ => 0,
        };
        debug!(
            customer = %event.customer_id,
            tenant = %event.tenant_id,
            reason = reason.as_str(),
            violations,
            "rate limit exceeded"
        );

        let mut decision = Decision::rejected(reason).with_user_message(user_message);
        if let Some(at) = retry_at {
            decision = decision.with_retry_at(at);
        }
        decision
    }

    /// Record a violation and, past the rolling threshold, place a block
    /// whose duration doubles per extra violation up to the configured cap.
    fn record_violation(
        &self,
        state: &mut LimiterState,
        customer_id: &str,
        now: Instant,
        reason: RejectReason,
    ) -> usize {
        let window = self.config.violation_window();
        let entries = state
            .violations
            .entry(customer_id.to_string())
            .or_default();
        while let Some(&front) = entries.front() {
            if now.saturating_duration_since(front) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
        entries.push_back(now);
        let count = entries.len();

        if count >= self.config.violation_threshold {
            let excess = (count - self.config.violation_threshold) as u32;
            let duration = exponential_block(
                self.config.block_base(),
                self.config.block_max(),
                excess,
            );
            let record = BlockRecord { expires_at: now + duration, violations: count, reason };
            info!(
                customer = %customer_id,
                violations = count,
                block_ms = duration.as_millis() as u64,
                "blocking customer after repeated rate-limit violations"
            );
            state.blocks.insert(customer_id.to_string(), record);
        }

        count
    }

    /// Manually block a customer (administrative surface).
    pub fn block(&self, customer_id: &str, duration: Duration) {
        if let Ok(mut state) = self.state.write() {
            state.blocks.insert(
                customer_id.to_string(),
                BlockRecord {
                    expires_at: Instant::now() + duration,
                    violations: 0,
                    reason: RejectReason::RateBlocked,
                },
            );
        }
    }

    /// Manually lift a block. Returns true if one was present.
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

    /// Periodic sweep: prune every window, drop empty ones, drop expired
    /// blocks and stale violation entries.
    pub fn sweep(&self) {
        let now = Instant::now();
        let Ok(mut state) = self.state.write() else {
            return;
        };

        let customer_window = self.config.customer_window();
        state.customers.retain(|_, w| {
            w.prune(now, customer_window);
            !w.is_empty()
        });
        let burst_window = self.config.burst_window();
        state.bursts.retain(|_, w| {
            w.prune(now, burst_window);
            !w.is_empty()
        });
        let tenant_window = self.config.tenant_window();
        state.tenants.retain(|_, w| {
            w.prune(now, tenant_window);
            !w.is_empty()
        });
        state.global.prune(now, self.config.global_window());

        let violation_window = self.config.violation_window();
        state.violations.retain(|_, entries| {
            while let Some(&front) = entries.front() {
                if now.saturating_duration_since(front) >= violation_window {
                    entries.pop_front();
                } else {
                    break;
                }
            }
            !entries.is_empty()
        });
        state.blocks.retain(|_, b| b.expires_at > now);
    }

    /// Drop all windows and violation history but keep active blocks.
    /// Used by the emergency memory-pressure sweep.
    pub fn clear_histories(&self) {
        if let Ok(mut state) = self.state.write() {
            state.customers.clear();
            state.bursts.clear();
            state.tenants.clear();
            state.global = RateWindow::new();
            state.violations.clear();
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        match self.state.read() {
            Ok(state) => RateLimiterStats {
                active_customers: state.customers.len(),
                active_tenants: state.tenants.len(),
                // Expired blocks linger until lazily removed; don't count
                // them.
                blocked_customers: state
                    .blocks
                    .values()
                    .filter(|b| b.expires_at > now)
                    .count(),
                recent_violations: state.violations.values().map(VecDeque::len).sum(),
                global_count: state.global.len(),
            },
            Err(_) => RateLimiterStats {
                active_customers: 0,
                active_tenants: 0,
                blocked_customers: 0,
                recent_violations: 0,
                global_count: 0,
            },
        }
    }

    /// Log final stats and clear all state.
    pub fn shutdown(&self) {
        let stats = self.stats();
        info!(
            active_customers = stats.active_customers,
            blocked_customers = stats.blocked_customers,
            recent_violations = stats.recent_violations,
            "rate limiter shutting down"
        );
        if let Ok(mut state) = self.state.write() {
            *state = LimiterState::default();
        }
    }
}

fn exponential_block(base: Duration, max: Duration, excess: u32) -> Duration {
    let factor = 2u32.saturating_pow(excess.min(16));
    base.saturating_mul(factor).min(max)
}
