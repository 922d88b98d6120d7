#![forbid(unsafe_code)]

pub mod admission;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod service;
pub mod telemetry;
pub mod tenant;
pub mod transport;

pub use admission::duplicate::{DuplicateDetector, DuplicateVerdict, FingerprintId};
pub use admission::pipeline::{
    Admitted, AdmissionPipeline, DuplicateGate, GateStats, RateGate, ThreatGate,
};
pub use admission::rate_limit::RateLimiter;
pub use admission::session::{Session, SessionKey, SessionStep, SessionStore};
pub use admission::threat::ThreatMonitor;
pub use config::{load_from_path, Config};
pub use error::{GateError, Result};
pub use event::{Decision, InboundEvent, RejectReason, Severity};
pub use handler::{DemoCommerceHandler, HandlerOutcome, MessageHandler};
pub use service::run;
pub use tenant::{InMemoryTenantDirectory, TenantDirectory, TenantProfile};
pub use transport::{ChatTransport, JsonLineTransport, NoopTransport, WireEvent, WireReply};
