use crate::telemetry::{
    handle_metrics, health_check_response, live_check_response, ready_check_response,
};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Start the observability server that handles metrics and health checks
/// This server runs on a dedicated port and serves:
/// - `/metrics` - Prometheus metrics
/// - `/health` - Health check endpoint
/// - `/ready` - Readiness check endpoint
/// - `/live` - Liveness check endpoint
pub async fn start_observability_server(
    port: u16,
    registry: Registry,
    ready: Arc<AtomicBool>,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(?addr, "Observability server started (metrics + health checks)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Observability server: shutdown requested");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "Observability server: accept error");
                        continue;
                    }
                };

                let registry = registry.clone();
                let ready = ready.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        let ready = ready.clone();
                        async move {
                            let path = req.uri().path();

                            let result = match path {
                                "/health" => health_check_response(),
                                "/ready" => ready_check_response(ready.load(Ordering::Relaxed)),
                                "/live" => live_check_response(),
                                "/metrics" => handle_metrics(&registry),
                                _ => {
                                    let body = Full::new(Bytes::from("Not Found"))
                                        .map_err(|never| match never {})
                                        .boxed();
                                    let mut resp = hyper::Response::new(body);
                                    *resp.status_mut() = hyper::StatusCode::NOT_FOUND;
                                    return Ok::<_, hyper::Error>(resp);
                                }
                            };

                            match result {
                                Ok(resp) => Ok(resp),
                                Err(_) => {
                                    let body = Full::new(Bytes::from("Internal Server Error"))
                                        .map_err(|never| match never {})
                                        .boxed();
                                    let mut resp = hyper::Response::new(body);
                                    *resp.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
                                    Ok(resp)
                                }
                            }
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "Observability server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("Observability server stopped");
    Ok(())
}
