//! HTTP response sink: answers requests parked by a request source.

use axum::body::Bytes;
use axum::http::StatusCode;
use std::sync::Arc;

use crate::config::schema::ResponseSinkConfig;
use crate::correlation::{CorrelationKey, ResponseRegistry};
use crate::error::{BridgeError, BridgeResult};
use crate::event::Event;
use crate::http::headers::{build_header_map, parse_headers, Header};
use crate::http::HttpReply;
use crate::observability::metrics;
use crate::pipeline::context::BridgeContext;
use crate::pipeline::request_source::RequestExchange;
use crate::pipeline::template::{is_dynamic, render};

pub struct ResponseSink {
    config: ResponseSinkConfig,
    status: StatusCode,
    headers: Option<Vec<Header>>,
    exchanges: Option<Arc<ResponseRegistry<RequestExchange>>>,
}

impl ResponseSink {
    pub fn new(config: ResponseSinkConfig) -> BridgeResult<Self> {
        if config.source_id.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "http-response sink requires a source_id".into(),
            ));
        }
        let status = StatusCode::from_u16(config.status_code).map_err(|_| {
            BridgeError::Configuration(format!("invalid status code {}", config.status_code))
        })?;
        let headers = if is_dynamic(&config.headers) {
            None
        } else {
            Some(parse_headers(&config.headers)?)
        };

        Ok(Self {
            config,
            status,
            headers,
            exchanges: None,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.config.source_id
    }

    pub fn init(&mut self, pipeline: &str, ctx: &BridgeContext) -> BridgeResult<()> {
        tracing::debug!(pipeline = %pipeline, source_id = %self.config.source_id, "Response sink ready");
        self.exchanges = Some(Arc::clone(&ctx.exchanges));
        Ok(())
    }

    /// Reply to the request identified by the event's message id.
    ///
    /// Returns false when nobody is waiting for that id anymore.
    pub fn publish(&self, event: &Event) -> BridgeResult<bool> {
        let exchanges = self.exchanges.as_ref().ok_or_else(|| {
            BridgeError::Configuration(format!(
                "response sink for '{}' is not initialized",
                self.config.source_id
            ))
        })?;

        let message_id = render(&self.config.message_id, event);
        if message_id.is_empty() {
            tracing::warn!(source_id = %self.config.source_id, "Event carries no message id, dropping");
            metrics::record_dropped_event("missing_message_id");
            return Ok(false);
        }

        let headers = match &self.headers {
            Some(headers) => headers.clone(),
            None => parse_headers(&render(&self.config.headers, event))?,
        };
        let body = Bytes::from(event.payload.clone().into_bytes());
        let header_map = build_header_map(&headers, self.config.map, body.len())?;
        let reply = HttpReply::new(self.status, header_map, body);

        let Some(listener) = exchanges.lookup(&CorrelationKey::new(self.config.source_id.as_str())) else {
            tracing::warn!(source_id = %self.config.source_id, "No request source registered, dropping reply");
            metrics::record_lookup_miss(&self.config.source_id);
            return Ok(false);
        };

        let answered = listener.handler().reply(&message_id, reply);
        if !answered {
            tracing::warn!(
                source_id = %self.config.source_id,
                message_id = %message_id,
                "Requester no longer waiting, dropping reply"
            );
            metrics::record_lookup_miss(&self.config.source_id);
        }
        Ok(answered)
    }

    pub fn teardown(&mut self) {
        self.exchanges = None;
    }
}
