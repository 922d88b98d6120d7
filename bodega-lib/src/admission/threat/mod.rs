//! Content and behavioral risk scoring with temporary blocking.
//!
//! Four analyses run per event (an internal rate model, content analysis,
//! behavioral analysis and cross-customer pattern analysis) and their
//! findings are summed into a severity-weighted risk delta. The running
//! per-customer risk score decays toward zero while the customer is quiet
//! and is boosted by new findings. Critical deltas, or too many violations
//! inside the medium window, escalate into a temporary block.

mod behavior;
mod content;
mod monitor;

pub use monitor::{Category, Finding, ThreatMonitor, ThreatStats, ViolationKind};
