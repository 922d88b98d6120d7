use thiserror::Error;

use crate::admission::session::SessionStep;

/// Errors that can occur in the admission gate
#[derive(Error, Debug)]
pub enum GateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionStep, to: SessionStep },

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
