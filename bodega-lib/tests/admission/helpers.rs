//! Shared helpers for the admission test suites.

use bodega_lib::InboundEvent;

static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Build an event with a unique message id.
pub fn event(customer: &str, tenant: &str, text: &str) -> InboundEvent {
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    InboundEvent::new(customer, tenant, text, format!("msg-{n}"))
}

/// Build an event with a fixed message id.
pub fn event_with_id(customer: &str, tenant: &str, text: &str, id: &str) -> InboundEvent {
    InboundEvent::new(customer, tenant, text, id)
}
