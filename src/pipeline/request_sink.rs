//! HTTP request sink.
//!
//! # Responsibilities
//! - Publish each event as an outbound HTTP request
//! - Attach a `ResponseDelivery` so the response reaches its consumer
//! - Hand the caller a `PendingSend` for the send's terminal state
//!
//! # Design Decisions
//! - The send itself runs on a plain tokio task; response processing runs on
//!   the shared `WorkerPool`
//! - Options without placeholders are parsed once at construction

use axum::body::Bytes;
use axum::http::Method;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::config::schema::RequestSinkConfig;
use crate::dispatch::{DeliveryTarget, PendingSend, ResponseDelivery, SendState};
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventConsumer};
use crate::http::headers::{build_header_map, parse_headers, Header};
use crate::http::OutboundRequest;
use crate::observability::metrics;
use crate::pipeline::context::BridgeContext;
use crate::pipeline::template::{is_dynamic, render};

pub struct RequestSink {
    config: RequestSinkConfig,
    method: Method,
    url: Option<Url>,
    headers: Option<Vec<Header>>,
    consumer: Option<Arc<dyn EventConsumer>>,
    ctx: Option<BridgeContext>,
}

impl RequestSink {
    pub fn new(config: RequestSinkConfig) -> BridgeResult<Self> {
        if config.sink_id.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "http-request sink requires a sink_id".into(),
            ));
        }
        if config.download_enabled
            && config.download_path.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(BridgeError::Configuration(format!(
                "download_path is mandatory when download is enabled for sink '{}'",
                config.sink_id
            )));
        }

        let method = match config.method.as_deref() {
            None => Method::POST,
            Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| BridgeError::Configuration(format!("invalid method '{}'", m)))?,
        };

        let url = if is_dynamic(&config.publisher_url) {
            None
        } else {
            Some(parse_url(&config.publisher_url).map_err(|e| {
                BridgeError::Configuration(format!("sink '{}': {}", config.sink_id, e))
            })?)
        };

        let headers = if is_dynamic(&config.headers) {
            None
        } else {
            Some(parse_headers(&config.headers)?)
        };

        Ok(Self {
            config,
            method,
            url,
            headers,
            consumer: None,
            ctx: None,
        })
    }

    /// Deliver responses straight to `consumer` instead of through the registry.
    pub fn with_consumer(mut self, consumer: Arc<dyn EventConsumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    pub fn sink_id(&self) -> &str {
        &self.config.sink_id
    }

    pub fn init(&mut self, pipeline: &str, ctx: &BridgeContext) -> BridgeResult<()> {
        tracing::info!(
            pipeline = %pipeline,
            sink_id = %self.config.sink_id,
            url = %self.config.publisher_url,
            method = %self.method,
            "Request sink ready"
        );
        self.ctx = Some(ctx.clone());
        Ok(())
    }

    /// Send `event` and return the handle tracking its response.
    pub fn publish(&self, event: &Event) -> BridgeResult<PendingSend> {
        let ctx = self.ctx.as_ref().ok_or_else(|| {
            BridgeError::Configuration(format!("sink '{}' is not initialized", self.config.sink_id))
        })?;

        let url = match &self.url {
            Some(url) => url.clone(),
            None => parse_url(&render(&self.config.publisher_url, event))?,
        };
        let headers = match &self.headers {
            Some(headers) => headers.clone(),
            None => parse_headers(&render(&self.config.headers, event))?,
        };

        let body = Bytes::from(event.payload.clone().into_bytes());
        let header_map = build_header_map(&headers, self.config.map, body.len())?;

        let target = match &self.consumer {
            Some(consumer) => DeliveryTarget::Direct(Arc::clone(consumer)),
            None => DeliveryTarget::Registry {
                registry: Arc::clone(&ctx.responses),
                owner_id: self.config.sink_id.clone(),
            },
        };
        let metadata = event.metadata.project(&self.config.attributes);
        let mut delivery = ResponseDelivery::new(url.as_str(), target, metadata, ctx.max_payload_bytes);
        if self.config.download_enabled {
            if let Some(path) = &self.config.download_path {
                delivery = delivery.with_download(PathBuf::from(render(path, event)));
            }
        }

        let request = OutboundRequest {
            method: self.method.clone(),
            url,
            headers: header_map,
            body,
        };

        let (tx, pending) = PendingSend::channel();
        let transport = Arc::clone(&ctx.transport);
        let pool = ctx.pool.clone();
        tokio::spawn(async move {
            let result = transport.send(request).await;
            let state = match pool.submit(delivery.on_response(result)).await {
                Ok(Some(state)) => state,
                Ok(None) => SendState::Failed(BridgeError::PoolClosed),
                Err(e) => {
                    tracing::error!(error = %e, "Delivery task failed");
                    SendState::Failed(BridgeError::DeliveryAborted)
                }
            };
            let _ = tx.send(state);
        });

        metrics::record_request_sent(&self.config.sink_id);
        Ok(pending)
    }

    pub fn teardown(&mut self) {
        if self.ctx.take().is_some() {
            tracing::debug!(sink_id = %self.config.sink_id, "Request sink stopped");
        }
    }
}

fn parse_url(raw: &str) -> BridgeResult<Url> {
    Url::parse(raw.trim()).map_err(|e| BridgeError::InvalidRequest(format!("url '{}': {}", raw, e)))
}
