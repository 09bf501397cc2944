//! Worker client — issues `Predict` to a worker over HTTP/1.
//!
//! Each call opens a fresh connection, bounded by a single deadline that
//! covers connecting, sending, and reading the reply. Failing to connect
//! is reported separately from failing after the connection is up, which
//! is what lets the health monitor tell `Unreachable` from `FailedProbe`.

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};
use crate::types::{InferenceRequest, InferenceResponse};

/// The `Predict` operation, as seen by dispatch and health probing.
pub trait WorkerClient: Send + Sync {
    /// Send `request` to the worker at `address`, giving up after `timeout`.
    fn predict(
        &self,
        address: &str,
        request: &InferenceRequest,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<InferenceResponse>> + Send;
}

/// JSON-over-HTTP worker client built on hyper.
#[derive(Debug, Clone, Default)]
pub struct HttpWorkerClient;

impl HttpWorkerClient {
    pub fn new() -> Self {
        Self
    }
}

impl WorkerClient for HttpWorkerClient {
    async fn predict(
        &self,
        address: &str,
        request: &InferenceRequest,
        timeout: Duration,
    ) -> WorkerResult<InferenceResponse> {
        let started = Instant::now();

        let stream = match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(error = %e, %address, "worker connection failed");
                return Err(WorkerError::Unreachable {
                    address: address.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                debug!(%address, "worker connection timed out");
                return Err(WorkerError::Unreachable {
                    address: address.to_string(),
                    reason: format!("connect timed out after {timeout:?}"),
                });
            }
        };

        let remaining = timeout.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, exchange(stream, address, request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%address, "worker request timed out");
                Err(WorkerError::Timeout {
                    address: address.to_string(),
                    timeout,
                })
            }
        }
    }
}

/// Send one `POST /predict` over an established connection.
async fn exchange(
    stream: tokio::net::TcpStream,
    address: &str,
    request: &InferenceRequest,
) -> WorkerResult<InferenceResponse> {
    let protocol = |reason: String| WorkerError::Protocol {
        address: address.to_string(),
        reason,
    };

    let body = serde_json::to_vec(request).map_err(|e| protocol(e.to_string()))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| protocol(format!("handshake failed: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method(http::Method::POST)
        .uri("/predict")
        .header(http::header::HOST, address)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::USER_AGENT, "dio-control-plane/0.1")
        .body(Full::new(Bytes::from(body)))
        .map_err(|e| protocol(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| protocol(format!("request failed: {e}")))?;

    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| protocol(format!("reading body failed: {e}")))?
        .to_bytes();

    if !status.is_success() {
        let message = String::from_utf8_lossy(&bytes).trim().to_string();
        debug!(%status, %address, "worker returned non-2xx");
        return Err(WorkerError::Application {
            address: address.to_string(),
            status: status.as_u16(),
            message: if message.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                message
            },
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| protocol(format!("invalid response body: {e}")))
}
