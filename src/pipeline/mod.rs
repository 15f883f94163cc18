//! Pipelines and their HTTP elements.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     Pipeline::publish(sink_id, event)
//!     → request_sink.rs (Transport::send, PendingSend)
//!     → ResponseDelivery → responses registry → response_source.rs → consumer
//!
//! Inbound:
//!     InboundServer → request_source.rs (park, DispatchWorker) → consumer
//!     Pipeline::publish(source_id, event)
//!     → response_sink.rs → exchanges registry → parked request answered
//! ```
//!
//! # Design Decisions
//! - A pipeline's name is the owner of every listener its elements register
//! - Start is all-or-nothing: a failing element tears down those before it
//! - Nothing is torn down implicitly; call `shutdown`

pub mod context;
pub mod element;
pub mod request_sink;
pub mod request_source;
pub mod response_sink;
pub mod response_source;
pub mod template;

use std::sync::Arc;

use crate::config::{ElementConfig, PipelineConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventConsumer};

pub use context::BridgeContext;
pub use element::{Element, Published};
pub use request_source::RequestExchange;

pub struct Pipeline {
    name: String,
    elements: Vec<Element>,
    running: bool,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
            running: false,
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Build every element of `config`. `consumer_for` supplies the consumer
    /// each source pushes into.
    pub fn from_config<F>(config: &PipelineConfig, mut consumer_for: F) -> BridgeResult<Self>
    where
        F: FnMut(&ElementConfig) -> Arc<dyn EventConsumer>,
    {
        let mut pipeline = Pipeline::new(config.name.clone());
        for element in &config.elements {
            let consumer = consumer_for(element);
            pipeline.elements.push(Element::from_config(element, consumer)?);
        }
        Ok(pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Initialize every element in order.
    pub fn start(&mut self, ctx: &BridgeContext) -> BridgeResult<()> {
        if self.running {
            return Ok(());
        }

        for i in 0..self.elements.len() {
            if let Err(e) = self.elements[i].init(&self.name, ctx) {
                tracing::error!(
                    pipeline = %self.name,
                    element = %self.elements[i].id(),
                    kind = self.elements[i].kind(),
                    error = %e,
                    "Element failed to start"
                );
                for started in self.elements[..i].iter_mut().rev() {
                    started.teardown();
                }
                return Err(e);
            }
        }

        self.running = true;
        tracing::info!(pipeline = %self.name, elements = self.elements.len(), "Pipeline started");
        Ok(())
    }

    /// Hand `event` to the sink registered under `element_id`.
    pub fn publish(&self, element_id: &str, event: &Event) -> BridgeResult<Published> {
        if !self.running {
            return Err(BridgeError::Configuration(format!(
                "pipeline '{}' is not running",
                self.name
            )));
        }
        let sink = self
            .elements
            .iter()
            .find(|e| e.is_sink() && e.id() == element_id)
            .ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "pipeline '{}' has no sink '{}'",
                    self.name, element_id
                ))
            })?;
        sink.handle(event)
    }

    /// Tear down every element, last started first.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        for element in self.elements.iter_mut().rev() {
            element.teardown();
        }
        self.running = false;
        tracing::info!(pipeline = %self.name, "Pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RequestSourceConfig, ResponseSourceConfig};
    use crate::config::BridgeConfig;
    use crate::event::LoggingConsumer;

    fn response_source(sink_id: &str) -> ElementConfig {
        ElementConfig::HttpResponseSource(ResponseSourceConfig {
            sink_id: sink_id.into(),
            http_status_code: None,
            download_enabled: false,
        })
    }

    fn request_source(source_id: &str, path: &str) -> ElementConfig {
        ElementConfig::HttpRequestSource(RequestSourceConfig {
            source_id: source_id.into(),
            path: path.into(),
            attributes: Vec::new(),
        })
    }

    fn build(name: &str, elements: Vec<ElementConfig>) -> Pipeline {
        let config = PipelineConfig {
            name: name.into(),
            elements,
        };
        Pipeline::from_config(&config, |e| Arc::new(LoggingConsumer::new(e.owner_id()))).unwrap()
    }

    #[test]
    fn failed_start_rolls_back() {
        let ctx = BridgeContext::from_config(&BridgeConfig::default());

        let mut first = build("first", vec![response_source("foo")]);
        first.start(&ctx).unwrap();

        let mut second = build(
            "second",
            vec![request_source("orders", "/orders"), response_source("foo")],
        );
        assert!(matches!(
            second.start(&ctx),
            Err(BridgeError::DuplicateRegistration { .. })
        ));
        assert!(!second.is_running());
        assert!(ctx.exchanges.is_empty());
        assert!(ctx.routes.is_empty());
        assert_eq!(ctx.responses.len(), 1);

        first.shutdown();
        assert!(ctx.responses.is_empty());
        second.start(&ctx).unwrap();
    }

    #[test]
    fn publish_requires_sink() {
        let ctx = BridgeContext::from_config(&BridgeConfig::default());
        let mut pipeline = build("app", vec![response_source("foo")]);
        assert!(pipeline.publish("foo", &Event::new("x")).is_err());
        pipeline.start(&ctx).unwrap();
        assert!(pipeline.publish("foo", &Event::new("x")).is_err());
    }
}
