//! Sliding-window rate limiting across three scopes.
//!
//! Every check prunes the scope's timestamp window before counting, so the
//! view is always a trailing window over arrival times:
//!
//! 1. **RateWindow** (`window.rs`): an ordered timestamp sequence per scope
//!    key, pruned on each access.
//!
//! 2. **RateLimiter** (`limiter.rs`): customer / tenant / global scopes with
//!    independent windows and capacities, a short per-customer burst window,
//!    and escalating temporary blocks for repeat offenders.
//!
//! Rejection precedence when several scopes would fail: active block, then
//! global, tenant, customer, burst. Each carries its own user-facing
//! message.

mod limiter;
mod window;

pub use limiter::{BlockRecord, RateLimiter, RateLimiterStats};
pub use window::RateWindow;
