//! Request dispatch worker.
//!
//! # Responsibilities
//! - Drain one inbound message's body to a payload
//! - Build transport metadata from the declared attribute names
//! - Forward `(payload, metadata)` to the consumer
//!
//! # Design Decisions
//! - One worker per inbound message, always run on the `WorkerPool`
//! - Empty payloads are dropped without a downstream call
//! - Read failures are logged and end the worker; nothing propagates to the pool

use std::sync::Arc;

use crate::event::{Event, EventConsumer, TransportMetadata};
use crate::http::message::RawMessage;
use crate::observability::metrics;

/// What a worker did with its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Forwarded,
    EmptyPayload,
    ReadFailed,
}

/// Unit of work for a single inbound message.
pub struct DispatchWorker {
    owner_id: String,
    message: RawMessage,
    attributes: Arc<[String]>,
    seed: TransportMetadata,
    consumer: Arc<dyn EventConsumer>,
    max_payload_bytes: usize,
}

impl DispatchWorker {
    pub fn new(
        owner_id: impl Into<String>,
        message: RawMessage,
        attributes: Arc<[String]>,
        consumer: Arc<dyn EventConsumer>,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            message,
            attributes,
            seed: TransportMetadata::new(),
            consumer,
            max_payload_bytes,
        }
    }

    /// Values available to declared attributes besides request headers
    /// (e.g. the message id).
    pub fn with_seed(mut self, seed: TransportMetadata) -> Self {
        self.seed = seed;
        self
    }

    pub async fn run(self) -> DispatchOutcome {
        let DispatchWorker {
            owner_id,
            message,
            attributes,
            mut seed,
            consumer,
            max_payload_bytes,
        } = self;

        for (name, value) in message.headers.iter() {
            if let Ok(value) = value.to_str() {
                if !seed.contains(name.as_str()) {
                    seed.insert(name.as_str(), value);
                }
            }
        }
        let info = message.info.clone();

        let payload = match message.read_payload(max_payload_bytes).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(owner = %owner_id, error = %e, "Failed to read inbound payload");
                metrics::record_dropped_event("read_failed");
                return DispatchOutcome::ReadFailed;
            }
        };

        if payload.is_empty() {
            tracing::debug!(owner = %owner_id, "Empty payload event, dropping");
            metrics::record_dropped_event("empty_payload");
            return DispatchOutcome::EmptyPayload;
        }

        let metadata = seed.project(&attributes).with_protocol(&info);
        tracing::debug!(owner = %owner_id, bytes = payload.len(), "Submitted event");
        consumer.on_event(Event { payload, metadata });
        DispatchOutcome::Forwarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::metadata::{HTTP_METHOD, MESSAGE_ID, PROTOCOL};
    use crate::event::ProtocolInfo;
    use axum::body::Body;
    use axum::http::HeaderMap;
    use tokio::sync::mpsc;

    fn message(body: impl Into<Body>) -> RawMessage {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", "t-1".parse().unwrap());
        let info = ProtocolInfo {
            method: "POST".into(),
            host: "localhost".into(),
            port: 8280,
            protocol: "http".into(),
            path: "/orders".into(),
            status: None,
        };
        RawMessage::new(info, headers, body.into())
    }

    fn attrs(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|s| s.to_string()).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn forwards_payload_with_metadata() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut seed = TransportMetadata::new();
        seed.insert(MESSAGE_ID, "m-1");

        let outcome = DispatchWorker::new(
            "src",
            message("{\"a\":1}\n"),
            attrs(&[MESSAGE_ID, "x-trace"]),
            Arc::new(tx),
            1024,
        )
        .with_seed(seed)
        .run()
        .await;

        assert_eq!(outcome, DispatchOutcome::Forwarded);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, "{\"a\":1}");
        let names: Vec<_> = event.metadata.names().collect();
        assert_eq!(&names[..2], &[MESSAGE_ID, "x-trace"]);
        assert_eq!(event.metadata.get_str("x-trace").as_deref(), Some("t-1"));
        assert_eq!(event.metadata.get_str(HTTP_METHOD).as_deref(), Some("POST"));
        assert_eq!(event.metadata.get_str(PROTOCOL).as_deref(), Some("http"));
    }

    #[tokio::test]
    async fn empty_payload_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let outcome = DispatchWorker::new("src", message("\r\n"), attrs(&[]), Arc::new(tx), 1024)
            .run()
            .await;

        assert_eq!(outcome, DispatchOutcome::EmptyPayload);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn oversized_payload_is_not_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let outcome = DispatchWorker::new("src", message(vec![b'x'; 64]), attrs(&[]), Arc::new(tx), 8)
            .run()
            .await;

        assert_eq!(outcome, DispatchOutcome::ReadFailed);
        assert!(rx.try_recv().is_err());
    }
}
