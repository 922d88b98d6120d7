use serde::Serialize;
use std::time::{Duration, Instant};

use crate::error::{GateError, Result};

/// An inbound chat message as seen by the admission pipeline.
///
/// Consumed read-only by every stage; `received_at` is stamped at ingest and
/// is the single time reference all window math is based on.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub customer_id: String,
    pub tenant_id: String,
    pub text: String,
    pub message_id: String,
    pub received_at: Instant,
}

impl InboundEvent {
    pub fn new(
        customer_id: impl Into<String>,
        tenant_id: impl Into<String>,
        text: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            tenant_id: tenant_id.into(),
            text: text.into(),
            message_id: message_id.into(),
            received_at: Instant::now(),
        }
    }

    /// Contract check: a missing required field fails this single event,
    /// never the process.
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.is_empty() {
            return Err(GateError::InvalidEvent("missing customer_id".into()));
        }
        if self.tenant_id.is_empty() {
            return Err(GateError::InvalidEvent("missing tenant_id".into()));
        }
        if self.message_id.is_empty() {
            return Err(GateError::InvalidEvent("missing message_id".into()));
        }
        if self.text.is_empty() {
            return Err(GateError::InvalidEvent("empty text".into()));
        }
        Ok(())
    }
}

/// Why a stage refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidEvent,
    InternalError,
    /// Customer is serving an active threat block.
    ThreatBlocked,
    /// The current evaluation crossed the critical threshold.
    ThreatCritical,
    /// Customer is serving an active rate-limit block.
    RateBlocked,
    GlobalLimit,
    TenantLimit,
    CustomerLimit,
    BurstLimit,
    ExactMessageId,
    ExactContent,
    CustomerRepeat,
    CustomerSimilar,
    BusinessSpamIdentical,
    BusinessSpamSimilar,
    CurrentlyProcessing,
}

impl RejectReason {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::InvalidEvent => "invalid_event",
            RejectReason::InternalError => "internal_error",
            RejectReason::ThreatBlocked => "threat_blocked",
            RejectReason::ThreatCritical => "threat_critical",
            RejectReason::RateBlocked => "rate_blocked",
            RejectReason::GlobalLimit => "global_limit",
            RejectReason::TenantLimit => "tenant_limit",
            RejectReason::CustomerLimit => "customer_limit",
            RejectReason::BurstLimit => "burst_limit",
            RejectReason::ExactMessageId => "exact_message_id",
            RejectReason::ExactContent => "exact_content",
            RejectReason::CustomerRepeat => "customer_repeat",
            RejectReason::CustomerSimilar => "customer_similar",
            RejectReason::BusinessSpamIdentical => "business_spam_identical",
            RejectReason::BusinessSpamSimilar => "business_spam_similar",
            RejectReason::CurrentlyProcessing => "currently_processing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Outcome of a single admission stage.
///
/// Policy rejections are decisions, not errors: the pipeline stops at the
/// first `Rejected` and optionally relays `user_message` to the customer.
#[derive(Debug, Clone)]
pub enum Decision {
    Allowed {
        /// Set when a stage lets the message through but wants downstream
        /// visibility (e.g. a high-severity threat finding short of a block).
        severity: Option<Severity>,
    },
    Rejected {
        reason: RejectReason,
        severity: Option<Severity>,
        retry_at: Option<Instant>,
        user_message: Option<String>,
    },
}

impl Decision {
    pub fn allowed() -> Self {
        Decision::Allowed { severity: None }
    }

    pub fn flagged(severity: Severity) -> Self {
        Decision::Allowed { severity: Some(severity) }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Decision::Rejected { reason, severity: None, retry_at: None, user_message: None }
    }

    pub fn with_severity(self, severity: Severity) -> Self {
        match self {
            Decision::Allowed { .. } => Decision::Allowed { severity: Some(severity) },
            Decision::Rejected { reason, retry_at, user_message, .. } => {
                Decision::Rejected { reason, severity: Some(severity), retry_at, user_message }
            }
        }
    }

    pub fn with_retry_at(self, at: Instant) -> Self {
        match self {
            Decision::Rejected { reason, severity, user_message, .. } => {
                Decision::Rejected { reason, severity, retry_at: Some(at), user_message }
            }
            allowed => allowed,
        }
    }

    pub fn with_user_message(self, msg: impl Into<String>) -> Self {
        match self {
            Decision::Rejected { reason, severity, retry_at, .. } => {
                Decision::Rejected { reason, severity, retry_at, user_message: Some(msg.into()) }
            }
            allowed => allowed,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected { .. })
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Decision::Rejected { reason, .. } => Some(*reason),
            Decision::Allowed { .. } => None,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Decision::Allowed { severity } => *severity,
            Decision::Rejected { severity, .. } => *severity,
        }
    }

    pub fn retry_after(&self, now: Instant) -> Option<Duration> {
        match self {
            Decision::Rejected { retry_at: Some(at), .. } => {
                Some(at.saturating_duration_since(now))
            }
            _ => None,
        }
    }

    pub fn user_message(&self) -> Option<&str> {
        match self {
            Decision::Rejected { user_message, .. } => user_message.as_deref(),
            Decision::Allowed { .. } => None,
        }
    }
}
