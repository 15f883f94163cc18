//! Raw transport messages and payload extraction.
//!
//! # Responsibilities
//! - Represent an inbound request or outbound response as head + body
//! - Drain a body to a text payload (bounded)
//! - Stream a body to a file for download mode
//! - Carry replies for waiting inbound requests
//!
//! # Design Decisions
//! - Payloads are decoded as UTF-8 (lossy) and joined line by line with `\n`
//! - Reading the body is the blocking part of dispatch; callers run it on the worker pool

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::error::{BridgeError, BridgeResult};
use crate::event::ProtocolInfo;

/// A request received or a response returned by the transport.
#[derive(Debug)]
pub struct RawMessage {
    pub info: ProtocolInfo,
    pub headers: HeaderMap,
    pub body: Body,
}

impl RawMessage {
    pub fn new(info: ProtocolInfo, headers: HeaderMap, body: Body) -> Self {
        Self { info, headers, body }
    }

    /// Drain the body into a text payload of at most `limit` bytes.
    pub async fn read_payload(self, limit: usize) -> BridgeResult<String> {
        read_payload(self.body, limit).await
    }
}

/// Read a whole body and decode it line by line.
pub async fn read_payload(body: Body, limit: usize) -> BridgeResult<String> {
    let bytes = axum::body::to_bytes(body, limit).await.map_err(body_error)?;
    Ok(decode_payload(&bytes))
}

/// Keep a transport failure raised inside the body stream; anything else
/// (length limit, decode) is a payload error.
fn body_error(err: axum::Error) -> BridgeError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(current) = source {
        if let Some(BridgeError::ConnectionUnavailable { url, reason }) = current.downcast_ref::<BridgeError>() {
            return BridgeError::ConnectionUnavailable {
                url: url.clone(),
                reason: reason.clone(),
            };
        }
        source = current.source();
    }
    BridgeError::Payload(err.to_string())
}

/// Lossy UTF-8 decode; lines are re-joined with `\n` so CRLF and trailing
/// line terminators do not leak into the payload.
pub fn decode_payload(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stream a body into `destination`, creating parent directories.
///
/// Returns the number of bytes written.
pub async fn download_to(body: Body, destination: &Path) -> BridgeResult<u64> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BridgeError::Payload(format!("create {}: {}", parent.display(), e)))?;
        }
    }

    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| BridgeError::Payload(format!("create {}: {}", destination.display(), e)))?;

    let mut written = 0u64;
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(body_error)?;
        file.write_all(&chunk)
            .await
            .map_err(|e| BridgeError::Payload(format!("write {}: {}", destination.display(), e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| BridgeError::Payload(format!("flush {}: {}", destination.display(), e)))?;

    Ok(written)
}

/// Reply written back to a waiting inbound request.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpReply {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Bare status reply with a short text body.
    pub fn plain(status: StatusCode, message: &'static str) -> Self {
        Self::new(status, HeaderMap::new(), message)
    }
}

impl IntoResponse for HttpReply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
