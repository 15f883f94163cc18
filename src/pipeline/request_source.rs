//! HTTP request source.
//!
//! # Responsibilities
//! - Serve a path on the inbound server
//! - Park each inbound request until a response sink answers it
//! - Dispatch the request body through a `DispatchWorker`
//!
//! # Design Decisions
//! - Every request gets a UUID v4 message id, exposed as `message.id`
//! - Unanswered requests get 504 after the response timeout
//! - Teardown releases every parked request with 503

use async_trait::async_trait;
use axum::http::StatusCode;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::schema::RequestSourceConfig;
use crate::correlation::{CorrelationKey, Listener, RegisteredListener, ResponseRegistry};
use crate::dispatch::{DispatchOutcome, DispatchWorker, WorkerPool};
use crate::error::{BridgeError, BridgeResult};
use crate::event::metadata::MESSAGE_ID;
use crate::event::{EventConsumer, TransportMetadata};
use crate::http::{HttpReply, InboundListener, InboundRoutes, RawMessage};
use crate::pipeline::context::BridgeContext;

/// Inbound requests of one source awaiting their replies.
pub struct RequestExchange {
    source_id: String,
    attributes: Arc<[String]>,
    consumer: Arc<dyn EventConsumer>,
    pool: WorkerPool,
    max_payload_bytes: usize,
    response_timeout: Duration,
    pending: DashMap<String, oneshot::Sender<HttpReply>>,
    open: AtomicBool,
}

impl RequestExchange {
    pub fn new(
        source_id: impl Into<String>,
        attributes: &[String],
        consumer: Arc<dyn EventConsumer>,
        ctx: &BridgeContext,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            attributes: attributes.into(),
            consumer,
            pool: ctx.pool.clone(),
            max_payload_bytes: ctx.max_payload_bytes,
            response_timeout: ctx.response_timeout,
            pending: DashMap::new(),
            open: AtomicBool::new(true),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Answer the request parked under `message_id`.
    ///
    /// False if no such request is waiting (answered, timed out or released).
    pub fn reply(&self, message_id: &str, reply: HttpReply) -> bool {
        match self.pending.remove(message_id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Number of requests waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Listener for RequestExchange {
    fn disconnect(&self) {
        self.open.store(false, Ordering::Release);

        let ids: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        let mut released = 0usize;
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(HttpReply::plain(StatusCode::SERVICE_UNAVAILABLE, "Source stopped"));
                released += 1;
            }
        }
        if released > 0 {
            tracing::info!(source_id = %self.source_id, released, "Released pending requests");
        }
    }
}

#[async_trait]
impl InboundListener for RequestExchange {
    async fn on_message(&self, message: RawMessage) -> HttpReply {
        let message_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(message_id.clone(), tx);

        // Checked after parking: `disconnect` closes before draining, so a
        // request parked during the drain is either drained or sees closed.
        if !self.open.load(Ordering::Acquire) {
            self.pending.remove(&message_id);
            return HttpReply::plain(StatusCode::SERVICE_UNAVAILABLE, "Source stopped");
        }

        let mut seed = TransportMetadata::new();
        seed.insert(MESSAGE_ID, message_id.clone());
        let worker = DispatchWorker::new(
            self.source_id.clone(),
            message,
            Arc::clone(&self.attributes),
            Arc::clone(&self.consumer),
            self.max_payload_bytes,
        )
        .with_seed(seed);

        let outcome = self.pool.submit(worker.run()).await;
        let rejected = match outcome {
            Ok(Some(DispatchOutcome::Forwarded)) => None,
            Ok(Some(DispatchOutcome::EmptyPayload)) => Some((StatusCode::BAD_REQUEST, "Empty payload")),
            Ok(Some(DispatchOutcome::ReadFailed)) => Some((StatusCode::BAD_REQUEST, "Unreadable payload")),
            Ok(None) => Some((StatusCode::SERVICE_UNAVAILABLE, "Source stopped")),
            Err(_) => Some((StatusCode::INTERNAL_SERVER_ERROR, "Dispatch failed")),
        };
        if let Some((status, reason)) = rejected {
            self.pending.remove(&message_id);
            return HttpReply::plain(status, reason);
        }

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => HttpReply::plain(StatusCode::SERVICE_UNAVAILABLE, "Source stopped"),
            Err(_) => {
                self.pending.remove(&message_id);
                tracing::warn!(
                    source_id = %self.source_id,
                    message_id = %message_id,
                    "No response within timeout"
                );
                HttpReply::plain(StatusCode::GATEWAY_TIMEOUT, "No response within timeout")
            }
        }
    }
}

struct Binding {
    routes: Arc<InboundRoutes>,
    exchanges: Arc<ResponseRegistry<RequestExchange>>,
    key: CorrelationKey,
    pipeline: String,
}

pub struct RequestSource {
    config: RequestSourceConfig,
    consumer: Arc<dyn EventConsumer>,
    binding: Option<Binding>,
}

impl RequestSource {
    pub fn new(config: RequestSourceConfig, consumer: Arc<dyn EventConsumer>) -> BridgeResult<Self> {
        if config.source_id.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "http-request source requires a source_id".into(),
            ));
        }
        if !config.path.starts_with('/') {
            return Err(BridgeError::Configuration(format!(
                "path '{}' of source '{}' must start with '/'",
                config.path, config.source_id
            )));
        }
        Ok(Self {
            config,
            consumer,
            binding: None,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.config.source_id
    }

    /// Register under `{source_id}`, then bind the path.
    pub fn init(&mut self, pipeline: &str, ctx: &BridgeContext) -> BridgeResult<()> {
        let exchange = Arc::new(RequestExchange::new(
            self.config.source_id.clone(),
            &self.config.attributes,
            Arc::clone(&self.consumer),
            ctx,
        ));
        let key = CorrelationKey::new(self.config.source_id.clone());

        ctx.exchanges
            .register(RegisteredListener::new(key.clone(), pipeline, Arc::clone(&exchange)))?;

        if let Err(e) = ctx.routes.bind(&self.config.path, pipeline, exchange) {
            ctx.exchanges.unregister(&key, pipeline);
            return Err(e);
        }

        self.binding = Some(Binding {
            routes: Arc::clone(&ctx.routes),
            exchanges: Arc::clone(&ctx.exchanges),
            key,
            pipeline: pipeline.to_string(),
        });
        Ok(())
    }

    pub fn teardown(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.routes.unbind(&self.config.path, &binding.pipeline);
            binding.exchanges.unregister(&binding.key, &binding.pipeline);
        }
    }
}
