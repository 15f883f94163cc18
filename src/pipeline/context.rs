//! Shared services injected into every pipeline element.

use std::sync::Arc;
use std::time::Duration;

use crate::config::BridgeConfig;
use crate::correlation::ResponseRegistry;
use crate::dispatch::WorkerPool;
use crate::http::{HyperTransport, InboundRoutes, Transport};
use crate::pipeline::request_source::RequestExchange;

/// Process-wide collaborators: registries, routes, pool and transport.
///
/// Cloning is cheap; every clone shares the same registries.
#[derive(Clone)]
pub struct BridgeContext {
    /// Response sources keyed by `{sink_id, status?}`.
    pub responses: Arc<ResponseRegistry>,
    /// Request sources keyed by `{source_id}`.
    pub exchanges: Arc<ResponseRegistry<RequestExchange>>,
    pub routes: Arc<InboundRoutes>,
    pub pool: WorkerPool,
    pub transport: Arc<dyn Transport>,
    pub max_payload_bytes: usize,
    pub response_timeout: Duration,
}

impl BridgeContext {
    pub fn from_config(config: &BridgeConfig) -> Self {
        let transport = Arc::new(HyperTransport::new(&config.client));
        Self::with_transport(config, transport)
    }

    /// Same as `from_config` with a caller-supplied transport.
    pub fn with_transport(config: &BridgeConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            responses: Arc::new(ResponseRegistry::new()),
            exchanges: Arc::new(ResponseRegistry::new()),
            routes: Arc::new(InboundRoutes::new()),
            pool: WorkerPool::new(config.workers.pool_size),
            transport,
            max_payload_bytes: config.workers.max_payload_bytes,
            response_timeout: Duration::from_secs(config.listener.response_timeout_secs),
        }
    }
}
