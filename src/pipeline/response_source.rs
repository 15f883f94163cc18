//! HTTP response source: consumes the responses of a request sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::schema::ResponseSourceConfig;
use crate::correlation::{CorrelationKey, Listener, RegisteredListener, ResponseListener, ResponseRegistry};
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventConsumer};

/// Registry handler forwarding delivered responses to the element's consumer.
struct Forwarder {
    sink_id: String,
    consumer: Arc<dyn EventConsumer>,
    open: AtomicBool,
}

impl Listener for Forwarder {
    fn disconnect(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl ResponseListener for Forwarder {
    fn deliver(&self, event: Event) {
        if !self.open.load(Ordering::Acquire) {
            tracing::debug!(sink_id = %self.sink_id, "Response source disconnected, dropping event");
            return;
        }
        self.consumer.on_event(event);
    }
}

struct Registration {
    registry: Arc<ResponseRegistry>,
    key: CorrelationKey,
    pipeline: String,
}

pub struct ResponseSource {
    config: ResponseSourceConfig,
    consumer: Arc<dyn EventConsumer>,
    registration: Option<Registration>,
}

impl ResponseSource {
    pub fn new(config: ResponseSourceConfig, consumer: Arc<dyn EventConsumer>) -> BridgeResult<Self> {
        if config.sink_id.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "http-response source requires a sink_id".into(),
            ));
        }
        Ok(Self {
            config,
            consumer,
            registration: None,
        })
    }

    pub fn key(&self) -> CorrelationKey {
        CorrelationKey::with_refinement(
            self.config.sink_id.clone(),
            self.config.http_status_code.map(|status| status.to_string()),
        )
    }

    pub fn sink_id(&self) -> &str {
        &self.config.sink_id
    }

    /// Register under `{sink_id, http_status_code?}`. Fails if the key is taken.
    pub fn init(&mut self, pipeline: &str, registry: &Arc<ResponseRegistry>) -> BridgeResult<()> {
        let key = self.key();
        let handler: Arc<dyn ResponseListener> = Arc::new(Forwarder {
            sink_id: self.config.sink_id.clone(),
            consumer: Arc::clone(&self.consumer),
            open: AtomicBool::new(true),
        });

        registry.register(
            RegisteredListener::new(key.clone(), pipeline, handler)
                .with_download(self.config.download_enabled),
        )?;

        self.registration = Some(Registration {
            registry: Arc::clone(registry),
            key,
            pipeline: pipeline.to_string(),
        });
        Ok(())
    }

    pub fn teardown(&mut self) {
        if let Some(reg) = self.registration.take() {
            reg.registry.unregister(&reg.key, &reg.pipeline);
        }
    }
}
