//! Wire types and the outbound side of the chat transport.
//!
//! The dev transport is newline-delimited JSON over TCP: one `WireEvent`
//! per inbound line, one `WireReply` per outbound line. Reply delivery is
//! best-effort and never changes an admission decision.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{GateError, Result};

/// One inbound chat message as received off the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEvent {
    pub customer_id: String,
    pub tenant_id: String,
    pub message_id: String,
    pub text: String,
}

/// One outbound reply line.
#[derive(Debug, Clone, Serialize)]
pub struct WireReply {
    pub customer_id: String,
    pub tenant_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl WireReply {
    pub fn text(customer_id: &str, tenant_id: &str, text: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            tenant_id: tenant_id.to_string(),
            text: text.into(),
            reject_reason: None,
            retry_after_ms: None,
        }
    }
}

/// Outbound reply delivery.
pub trait ChatTransport: Send {
    fn send_reply(
        &mut self,
        reply: &WireReply,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Newline-delimited JSON writer over any async byte sink.
pub struct JsonLineTransport<W> {
    writer: W,
}

impl<W> JsonLineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: AsyncWrite + Unpin + Send> ChatTransport for JsonLineTransport<W> {
    async fn send_reply(&mut self, reply: &WireReply) -> Result<()> {
        let mut line = serde_json::to_vec(reply)
            .map_err(|e| GateError::Transport(format!("failed to encode reply: {e}")))?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .map_err(|e| GateError::Transport(format!("failed to write reply: {e}")))?;
        Ok(())
    }
}

/// Discards every reply. Used in tests and for transports that are
/// receive-only.
pub struct NoopTransport;

impl ChatTransport for NoopTransport {
    async fn send_reply(&mut self, _reply: &WireReply) -> Result<()> {
        Ok(())
    }
}
