//! The dev/service run loop: a newline-delimited JSON TCP transport in
//! front of the admission pipeline, plus the periodic sweep task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader, Take};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::admission::pipeline::AdmissionPipeline;
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::event::InboundEvent;
use crate::handler::{HandlerOutcome, MessageHandler};
use crate::tenant::TenantDirectory;
use crate::transport::{ChatTransport, JsonLineTransport, WireEvent, WireReply};

/// Accept chat connections until the token is cancelled, then shut the
/// pipeline down. `ready` flips once the listener is bound so the
/// observability server's `/ready` answers truthfully.
pub async fn run(
    config: Config,
    pipeline: Arc<AdmissionPipeline>,
    handler: Arc<dyn MessageHandler>,
    tenants: Arc<dyn TenantDirectory>,
    ready: Arc<AtomicBool>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    info!(addr = %config.listen, "chat transport listening");
    ready.store(true, Ordering::Relaxed);

    let sweep_pipeline = pipeline.clone();
    let sweep_token = shutdown.clone();
    let sweep_interval = config.sessions.sweep_interval();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        // The first tick fires immediately; skip it.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = sweep_token.cancelled() => break,
                _ = interval.tick() => sweep_pipeline.sweep(),
            }
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("chat transport: shutdown requested");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "chat transport: accept error");
                        continue;
                    }
                };
                debug!(%peer, "chat connection opened");

                let pipeline = pipeline.clone();
                let handler = handler.clone();
                let tenants = tenants.clone();
                let token = shutdown.clone();
                tokio::spawn(async move {
                    handle_connection(stream, pipeline, handler, tenants, token).await;
                    debug!(%peer, "chat connection closed");
                });
            }
        }
    }

    ready.store(false, Ordering::Relaxed);
    let _ = sweeper.await;
    pipeline.shutdown();
    Ok(())
}

/// Hard cap on one inbound line; a connection exceeding it is closed so a
/// single peer cannot buffer unbounded input.
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Read one newline-terminated line from a length-capped reader.
///
/// `Ok(None)` is a clean end of stream; hitting the cap without a newline
/// is an error and the caller drops the connection.
async fn next_line<R>(reader: &mut Take<R>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    reader.set_limit(MAX_LINE_BYTES);
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && reader.limit() == 0 {
        return Err(GateError::Transport(format!(
            "inbound line exceeds {MAX_LINE_BYTES} bytes"
        )));
    }
    Ok(Some(line))
}

async fn handle_connection(
    stream: TcpStream,
    pipeline: Arc<AdmissionPipeline>,
    handler: Arc<dyn MessageHandler>,
    tenants: Arc<dyn TenantDirectory>,
    shutdown: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).take(MAX_LINE_BYTES);
    let mut transport = JsonLineTransport::new(write_half);

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = next_line(&mut reader) => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "chat connection read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let wire: WireEvent = match serde_json::from_str(&line) {
            Ok(wire) => wire,
            Err(e) => {
                debug!(error = %e, "unparseable inbound line, dropped");
                continue;
            }
        };

        if let Some(reply) = process_event(&pipeline, handler.as_ref(), tenants.as_ref(), wire) {
            // Best-effort: a failed reply never revisits the decision.
            if let Err(e) = transport.send_reply(&reply).await {
                debug!(error = %e, "reply delivery failed");
            }
        }
    }
}

/// Run one wire event through the pipeline and the business handler.
/// Returns the reply to send, if any; rejected duplicates go silent.
fn process_event(
    pipeline: &AdmissionPipeline,
    handler: &dyn MessageHandler,
    tenants: &dyn TenantDirectory,
    wire: WireEvent,
) -> Option<WireReply> {
    let profile = tenants.lookup_or_default(&wire.tenant_id);
    let customer_id = wire.customer_id.clone();
    let tenant_id = wire.tenant_id.clone();
    let event = InboundEvent::new(wire.customer_id, wire.tenant_id, wire.text, wire.message_id);
    let received_at = event.received_at;

    let admitted = match pipeline.admit(event) {
        Ok(admitted) => admitted,
        Err(decision) => {
            let text = decision.user_message()?.to_string();
            let mut reply = WireReply::text(&customer_id, &tenant_id, text);
            reply.reject_reason = decision.reason().map(|r| r.as_str().to_string());
            reply.retry_after_ms =
                decision.retry_after(received_at).map(|d| d.as_millis() as u64);
            return Some(reply);
        }
    };

    let mut session = admitted.session.clone();
    match handler.handle(&admitted.event, &profile, &mut session) {
        Ok(HandlerOutcome::Reply(text)) => {
            let reply = WireReply::text(&admitted.key.customer_id, &admitted.key.tenant_id, text);
            pipeline.complete(&admitted, session);
            Some(reply)
        }
        Ok(HandlerOutcome::CompleteOrder(text)) => {
            if let Err(e) = pipeline.finish_order(&admitted, &session) {
                warn!(error = %e, "order completion failed");
                pipeline.release(&admitted);
                return Some(WireReply::text(
                    &admitted.key.customer_id,
                    &admitted.key.tenant_id,
                    "Something went wrong, please try again.",
                ));
            }
            Some(WireReply::text(&admitted.key.customer_id, &admitted.key.tenant_id, text))
        }
        Err(e) => {
            warn!(error = %e, "handler failed");
            pipeline.release(&admitted);
            Some(WireReply::text(
                &admitted.key.customer_id,
                &admitted.key.tenant_id,
                "Something went wrong, please try again.",
            ))
        }
    }
}
