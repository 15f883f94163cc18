//! HTTP request/response correlation bridge.
//!
//! Lets a stream-processing pipeline publish events as HTTP requests and
//! receive the correlated responses, and serve inbound HTTP requests whose
//! replies the pipeline produces later.

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;

pub use config::BridgeConfig;
pub use correlation::{CorrelationKey, ResponseRegistry};
pub use error::{BridgeError, BridgeResult};
pub use event::{Event, EventConsumer};
pub use lifecycle::Shutdown;
pub use pipeline::{BridgeContext, Pipeline};
