//! Outbound transport.
//!
//! # Responsibilities
//! - Send a request and resolve with the raw response head and body
//! - Map connection-level failures (refused, reset, timeout) to
//!   `ConnectionUnavailable`
//! - Pass pool and timeout settings through to the HTTP client unchanged
//!
//! # Design Decisions
//! - `request_timeout_secs` bounds the whole exchange: the body stream
//!   carries the same deadline as the head
//! - A body that stalls or ends early fails with `ConnectionUnavailable`,
//!   surfaced when the body is read

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use futures_util::StreamExt;
use axum::http::{HeaderMap, Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::event::ProtocolInfo;
use crate::http::message::RawMessage;

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Non-blocking client capable of sending a request and returning its response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> BridgeResult<RawMessage>;
}

/// Transport backed by the hyper-util pooled client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HyperTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: OutboundRequest) -> BridgeResult<RawMessage> {
        if request.url.scheme() != "http" {
            return Err(BridgeError::InvalidRequest(format!(
                "unsupported scheme '{}' in {}",
                request.url.scheme(),
                request.url
            )));
        }

        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }
        let outbound = builder
            .body(Body::from(request.body))
            .map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;

        let deadline = Instant::now() + self.request_timeout;
        let response = match tokio::time::timeout_at(deadline, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(unavailable(&request.url, e.to_string())),
            Err(_) => {
                return Err(unavailable(
                    &request.url,
                    format!("no response within {}s", self.request_timeout.as_secs()),
                ))
            }
        };

        let status = response.status().as_u16();
        let (parts, body) = response.into_parts();
        let info = ProtocolInfo::from_url(request.method.as_str(), &request.url).with_status(status);
        let body = bounded_body(Body::new(body), deadline, request.url.to_string(), self.request_timeout);

        tracing::debug!(url = %request.url, status, "Response received");
        Ok(RawMessage::new(info, parts.headers, body))
    }
}

fn unavailable(url: &Url, reason: String) -> BridgeError {
    BridgeError::ConnectionUnavailable {
        url: url.to_string(),
        reason,
    }
}

/// Re-stream `body` so every frame must arrive before `deadline`. Read
/// errors and the deadline both end the stream with `ConnectionUnavailable`.
fn bounded_body(body: Body, deadline: Instant, url: String, timeout: Duration) -> Body {
    let frames = body.into_data_stream();
    let stream = futures_util::stream::unfold(Some(frames), move |frames| {
        let url = url.clone();
        async move {
            let mut frames = frames?;
            match tokio::time::timeout_at(deadline, frames.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(frames))),
                Ok(Some(Err(e))) => Some((
                    Err(BridgeError::ConnectionUnavailable {
                        url,
                        reason: format!("response body failed: {}", e),
                    }),
                    None,
                )),
                Ok(None) => None,
                Err(_) => Some((
                    Err(BridgeError::ConnectionUnavailable {
                        url,
                        reason: format!("response body not complete within {}s", timeout.as_secs()),
                    }),
                    None,
                )),
            }
        }
    });
    Body::from_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> OutboundRequest {
        OutboundRequest {
            method: Method::POST,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"{}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::new(&ClientConfig::default());
        let err = transport
            .send(request(&format!("http://{}/abc", addr)))
            .await
            .unwrap_err();
        assert!(err.is_connection_unavailable());
    }

    /// Backend that answers with a head promising 100 bytes, writes five,
    /// then either hangs up or goes silent.
    async fn short_body_backend(hang_up: bool) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello")
                .await;
            let _ = socket.flush().await;
            if !hang_up {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn truncated_body_is_unavailable() {
        let addr = short_body_backend(true).await;
        let transport = HyperTransport::new(&ClientConfig::default());

        let message = transport
            .send(request(&format!("http://{}/abc", addr)))
            .await
            .unwrap();
        assert_eq!(message.info.status, Some(200));

        let err = message.read_payload(1024).await.unwrap_err();
        assert!(err.is_connection_unavailable(), "got {:?}", err);
    }

    #[tokio::test]
    async fn stalled_body_hits_request_timeout() {
        let addr = short_body_backend(false).await;
        let config = ClientConfig {
            request_timeout_secs: 1,
            ..ClientConfig::default()
        };
        let transport = HyperTransport::new(&config);

        let message = transport
            .send(request(&format!("http://{}/abc", addr)))
            .await
            .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(10), message.read_payload(1024))
            .await
            .expect("body read must not outlive the request timeout")
            .unwrap_err();
        assert!(err.is_connection_unavailable(), "got {:?}", err);
    }

    #[tokio::test]
    async fn https_is_rejected() {
        let transport = HyperTransport::new(&ClientConfig::default());
        let err = transport.send(request("https://localhost/abc")).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));
    }
}
