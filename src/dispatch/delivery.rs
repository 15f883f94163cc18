//! Response delivery for outbound sends.
//!
//! # Responsibilities
//! - Own the pending state of one outbound send
//! - Turn the raw response into an event (or a downloaded file)
//! - Deliver directly to the sender's consumer, or through the registry
//! - Resolve the send exactly once: `Sent → Delivered | Failed`
//!
//! # Design Decisions
//! - No retries; transport failures surface as `ConnectionUnavailable`
//! - A registry miss is logged and counted, never raised
//! - `on_response` consumes the listener, so a send cannot resolve twice

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::correlation::{ResponseListener, ResponseRegistry};
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventConsumer, TransportMetadata};
use crate::http::message::{download_to, RawMessage};
use crate::observability::metrics;

/// Where a correlated response goes.
#[derive(Clone)]
pub enum DeliveryTarget {
    /// Roundtrip owned by the sender: hand the response to its consumer.
    Direct(Arc<dyn EventConsumer>),
    /// Resolve `(owner_id, status)` in the registry, falling back to `owner_id`.
    Registry {
        registry: Arc<ResponseRegistry<dyn ResponseListener>>,
        owner_id: String,
    },
}

/// What happened to a received response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Consumed,
    EmptyPayload,
    NoListener,
}

/// State of one outbound send.
#[derive(Debug)]
pub enum SendState {
    Sent,
    Delivered { status: u16, outcome: DeliveryOutcome },
    Failed(BridgeError),
}

impl SendState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SendState::Sent)
    }
}

/// Handle the sending element keeps for one send.
#[derive(Debug)]
pub struct PendingSend {
    state: SendState,
    rx: oneshot::Receiver<SendState>,
}

impl PendingSend {
    /// Handle plus the sender used to resolve it.
    pub fn channel() -> (oneshot::Sender<SendState>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                state: SendState::Sent,
                rx,
            },
        )
    }

    /// Current state without waiting.
    pub fn poll_state(&mut self) -> &SendState {
        if !self.state.is_terminal() {
            if let Ok(state) = self.rx.try_recv() {
                self.state = state;
            }
        }
        &self.state
    }

    /// Wait for the terminal state.
    pub async fn outcome(self) -> SendState {
        if self.state.is_terminal() {
            return self.state;
        }
        match self.rx.await {
            Ok(state) => state,
            Err(_) => SendState::Failed(BridgeError::DeliveryAborted),
        }
    }
}

/// Listener attached to one outbound send.
pub struct ResponseDelivery {
    url: String,
    target: DeliveryTarget,
    metadata: TransportMetadata,
    download: Option<PathBuf>,
    max_payload_bytes: usize,
}

impl ResponseDelivery {
    /// `metadata` holds the attributes propagated from the sending event.
    pub fn new(
        url: impl Into<String>,
        target: DeliveryTarget,
        metadata: TransportMetadata,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            url: url.into(),
            target,
            metadata,
            download: None,
            max_payload_bytes,
        }
    }

    /// Write the response body to `path` instead of emitting it.
    pub fn with_download(mut self, path: impl Into<PathBuf>) -> Self {
        self.download = Some(path.into());
        self
    }

    /// Resolve the send with the transport's result.
    pub async fn on_response(self, result: BridgeResult<RawMessage>) -> SendState {
        match result {
            Ok(message) => self.on_message(message).await,
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Request failed");
                metrics::record_send_failure(&self.url);
                SendState::Failed(e)
            }
        }
    }

    async fn on_message(self, message: RawMessage) -> SendState {
        let status = message.info.status.unwrap_or_default();
        let mut metadata = self.metadata.with_protocol(&message.info);

        let payload = match &self.download {
            Some(path) => match download_to(message.body, path).await {
                Ok(bytes) => {
                    tracing::debug!(url = %self.url, path = %path.display(), bytes, "Response downloaded");
                    let path = path.display().to_string();
                    metadata = metadata.with_download_path(path.clone());
                    path
                }
                Err(e) => {
                    tracing::error!(url = %self.url, error = %e, "Download failed");
                    return SendState::Failed(e);
                }
            },
            None => match message.read_payload(self.max_payload_bytes).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(url = %self.url, error = %e, "Failed to read response payload");
                    metrics::record_dropped_event("read_failed");
                    return SendState::Failed(e);
                }
            },
        };

        if payload.is_empty() {
            tracing::debug!(url = %self.url, status, "Empty payload event, dropping");
            metrics::record_dropped_event("empty_payload");
            return SendState::Delivered {
                status,
                outcome: DeliveryOutcome::EmptyPayload,
            };
        }

        let event = Event { payload, metadata };
        let outcome = match &self.target {
            DeliveryTarget::Direct(consumer) => {
                consumer.on_event(event);
                DeliveryOutcome::Consumed
            }
            DeliveryTarget::Registry { registry, owner_id } => {
                let refinement = status.to_string();
                match registry.resolve(owner_id, Some(&refinement)) {
                    Some(listener) => {
                        tracing::debug!(
                            key = %listener.key(),
                            download = listener.download_enabled(),
                            status,
                            "Delivering response"
                        );
                        listener.handler().deliver(event);
                        DeliveryOutcome::Consumed
                    }
                    None => {
                        tracing::warn!(owner = %owner_id, status, "No response listener registered, dropping response");
                        metrics::record_lookup_miss(owner_id);
                        DeliveryOutcome::NoListener
                    }
                }
            }
        };

        if outcome == DeliveryOutcome::Consumed {
            metrics::record_response_delivered(status);
        }
        SendState::Delivered { status, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{CorrelationKey, Listener, RegisteredListener};
    use crate::event::metadata::{DOWNLOAD_PATH, HTTP_METHOD, HTTP_STATUS_CODE, PROTOCOL};
    use crate::event::ProtocolInfo;
    use axum::body::Body;
    use axum::http::HeaderMap;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use url::Url;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl Listener for Collect {}

    impl ResponseListener for Collect {
        fn deliver(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn response(status: u16, body: &'static str) -> RawMessage {
        let url = Url::parse("http://localhost:8005/abc").unwrap();
        let info = ProtocolInfo::from_url("POST", &url).with_status(status);
        RawMessage::new(info, HeaderMap::new(), Body::from(body))
    }

    fn register(
        registry: &ResponseRegistry,
        key: CorrelationKey,
    ) -> Arc<Collect> {
        let collect = Arc::new(Collect::default());
        let handler: Arc<dyn ResponseListener> = collect.clone();
        registry
            .register(RegisteredListener::new(key, "app", handler))
            .unwrap();
        collect
    }

    fn via_registry(registry: &Arc<ResponseRegistry>) -> DeliveryTarget {
        DeliveryTarget::Registry {
            registry: registry.clone(),
            owner_id: "foo".into(),
        }
    }

    #[tokio::test]
    async fn unrefined_listener_receives_response() {
        let registry: Arc<ResponseRegistry> = Arc::new(ResponseRegistry::new());
        let collect = register(&registry, CorrelationKey::new("foo"));

        let state = ResponseDelivery::new("http://localhost:8005/abc", via_registry(&registry), TransportMetadata::new(), 1024)
            .on_response(Ok(response(200, "{\"ok\":true}")))
            .await;

        assert!(matches!(
            state,
            SendState::Delivered { status: 200, outcome: DeliveryOutcome::Consumed }
        ));
        let events = collect.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, "{\"ok\":true}");
        assert_eq!(events[0].metadata.get_str(HTTP_METHOD).as_deref(), Some("POST"));
        assert_eq!(events[0].metadata.get_str(PROTOCOL).as_deref(), Some("http"));
        assert_eq!(events[0].metadata.get_str(HTTP_STATUS_CODE).as_deref(), Some("200"));
    }

    #[tokio::test]
    async fn refined_only_listener_misses_other_status() {
        let registry: Arc<ResponseRegistry> = Arc::new(ResponseRegistry::new());
        let collect = register(&registry, CorrelationKey::for_status("foo", 200));

        let state = ResponseDelivery::new("http://localhost:8005/abc", via_registry(&registry), TransportMetadata::new(), 1024)
            .on_response(Ok(response(404, "not found")))
            .await;

        assert!(matches!(
            state,
            SendState::Delivered { status: 404, outcome: DeliveryOutcome::NoListener }
        ));
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refined_listener_wins_over_fallback() {
        let registry: Arc<ResponseRegistry> = Arc::new(ResponseRegistry::new());
        let any = register(&registry, CorrelationKey::new("foo"));
        let errors = register(&registry, CorrelationKey::for_status("foo", 500));

        ResponseDelivery::new("u", via_registry(&registry), TransportMetadata::new(), 1024)
            .on_response(Ok(response(500, "boom")))
            .await;

        assert_eq!(errors.0.lock().unwrap().len(), 1);
        assert!(any.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn direct_target_bypasses_registry() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut propagated = TransportMetadata::new();
        propagated.insert("orderId", 42);

        let state = ResponseDelivery::new("u", DeliveryTarget::Direct(Arc::new(tx)), propagated, 1024)
            .on_response(Ok(response(201, "created")))
            .await;

        assert!(matches!(state, SendState::Delivered { status: 201, .. }));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, "created");
        assert_eq!(event.metadata.names().next(), Some("orderId"));
    }

    #[tokio::test]
    async fn empty_response_is_not_delivered() {
        let registry: Arc<ResponseRegistry> = Arc::new(ResponseRegistry::new());
        let collect = register(&registry, CorrelationKey::new("foo"));

        let state = ResponseDelivery::new("u", via_registry(&registry), TransportMetadata::new(), 1024)
            .on_response(Ok(response(200, "")))
            .await;

        assert!(matches!(
            state,
            SendState::Delivered { outcome: DeliveryOutcome::EmptyPayload, .. }
        ));
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_terminal() {
        let registry: Arc<ResponseRegistry> = Arc::new(ResponseRegistry::new());
        let collect = register(&registry, CorrelationKey::new("foo"));

        let state = ResponseDelivery::new("u", via_registry(&registry), TransportMetadata::new(), 1024)
            .on_response(Err(BridgeError::ConnectionUnavailable {
                url: "u".into(),
                reason: "connection refused".into(),
            }))
            .await;

        match state {
            SendState::Failed(e) => assert!(e.is_connection_unavailable()),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_mode_delivers_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        ResponseDelivery::new("u", DeliveryTarget::Direct(Arc::new(tx)), TransportMetadata::new(), 1024)
            .with_download(&path)
            .on_response(Ok(response(200, "a,b\n1,2\n")))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, path.display().to_string());
        assert_eq!(
            event.metadata.get_str(DOWNLOAD_PATH),
            Some(path.display().to_string())
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn pending_send_resolves_once() {
        let (tx, mut pending) = PendingSend::channel();
        assert!(matches!(pending.poll_state(), SendState::Sent));

        tx.send(SendState::Delivered {
            status: 200,
            outcome: DeliveryOutcome::Consumed,
        })
        .unwrap();
        assert!(pending.poll_state().is_terminal());
        assert!(matches!(
            pending.outcome().await,
            SendState::Delivered { status: 200, .. }
        ));

        let (tx, pending) = PendingSend::channel();
        drop(tx);
        assert!(matches!(
            pending.outcome().await,
            SendState::Failed(BridgeError::DeliveryAborted)
        ));
    }
}
