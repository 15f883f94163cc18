//! Closed set of pipeline elements.

use std::sync::Arc;

use crate::config::ElementConfig;
use crate::dispatch::PendingSend;
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventConsumer};
use crate::pipeline::context::BridgeContext;
use crate::pipeline::request_sink::RequestSink;
use crate::pipeline::request_source::RequestSource;
use crate::pipeline::response_sink::ResponseSink;
use crate::pipeline::response_source::ResponseSource;

pub enum Element {
    RequestSink(RequestSink),
    ResponseSink(ResponseSink),
    RequestSource(RequestSource),
    ResponseSource(ResponseSource),
}

/// Result of handing an event to a sink.
#[derive(Debug)]
pub enum Published {
    /// Request sent; the handle resolves when its response is processed.
    Sent(PendingSend),
    /// Reply attempted; false when the requester was gone.
    Replied(bool),
}

impl Element {
    /// Build an element. Sources push what they receive into `consumer`.
    pub fn from_config(config: &ElementConfig, consumer: Arc<dyn EventConsumer>) -> BridgeResult<Self> {
        Ok(match config {
            ElementConfig::HttpRequestSink(c) => Element::RequestSink(RequestSink::new(c.clone())?),
            ElementConfig::HttpResponseSink(c) => Element::ResponseSink(ResponseSink::new(c.clone())?),
            ElementConfig::HttpRequestSource(c) => {
                Element::RequestSource(RequestSource::new(c.clone(), consumer)?)
            }
            ElementConfig::HttpResponseSource(c) => {
                Element::ResponseSource(ResponseSource::new(c.clone(), consumer)?)
            }
        })
    }

    /// Sink id or source id.
    pub fn id(&self) -> &str {
        match self {
            Element::RequestSink(e) => e.sink_id(),
            Element::ResponseSink(e) => e.source_id(),
            Element::RequestSource(e) => e.source_id(),
            Element::ResponseSource(e) => e.sink_id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Element::RequestSink(_) => "http-request-sink",
            Element::ResponseSink(_) => "http-response-sink",
            Element::RequestSource(_) => "http-request-source",
            Element::ResponseSource(_) => "http-response-source",
        }
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, Element::RequestSink(_) | Element::ResponseSink(_))
    }

    pub fn init(&mut self, pipeline: &str, ctx: &BridgeContext) -> BridgeResult<()> {
        match self {
            Element::RequestSink(e) => e.init(pipeline, ctx),
            Element::ResponseSink(e) => e.init(pipeline, ctx),
            Element::RequestSource(e) => e.init(pipeline, ctx),
            Element::ResponseSource(e) => e.init(pipeline, &ctx.responses),
        }
    }

    /// Publish `event` through a sink.
    pub fn handle(&self, event: &Event) -> BridgeResult<Published> {
        match self {
            Element::RequestSink(e) => e.publish(event).map(Published::Sent),
            Element::ResponseSink(e) => e.publish(event).map(Published::Replied),
            Element::RequestSource(_) | Element::ResponseSource(_) => Err(BridgeError::InvalidRequest(
                format!("{} '{}' does not accept events", self.kind(), self.id()),
            )),
        }
    }

    pub fn teardown(&mut self) {
        match self {
            Element::RequestSink(e) => e.teardown(),
            Element::ResponseSink(e) => e.teardown(),
            Element::RequestSource(e) => e.teardown(),
            Element::ResponseSource(e) => e.teardown(),
        }
    }
}
