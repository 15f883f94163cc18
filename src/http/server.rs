//! Inbound HTTP server.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all handler
//! - Route each request by path to the listener bound there
//! - Turn the request into a `RawMessage` and await the listener's reply
//! - Serve until the shutdown signal fires

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header::HOST, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::{BridgeError, BridgeResult};
use crate::event::ProtocolInfo;
use crate::http::message::{HttpReply, RawMessage};
use crate::observability::metrics;

/// Callback object receiving inbound requests.
#[async_trait]
pub trait InboundListener: Send + Sync {
    /// Accept a request and resolve with the reply to write back.
    async fn on_message(&self, message: RawMessage) -> HttpReply;
}

struct Route {
    owner: String,
    listener: Arc<dyn InboundListener>,
}

/// Path → listener table shared between sources and the server.
#[derive(Default)]
pub struct InboundRoutes {
    routes: DashMap<String, Route>,
}

impl InboundRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `path` with `listener` on behalf of pipeline `owner`.
    /// A path can be bound only once.
    pub fn bind(&self, path: &str, owner: &str, listener: Arc<dyn InboundListener>) -> BridgeResult<()> {
        match self.routes.entry(path.to_string()) {
            Entry::Occupied(_) => Err(BridgeError::Configuration(format!(
                "inbound path '{}' is already bound",
                path
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Route {
                    owner: owner.to_string(),
                    listener,
                });
                tracing::info!(path = %path, owner = %owner, "Inbound path bound");
                Ok(())
            }
        }
    }

    /// Stop serving `path` if `owner` bound it.
    pub fn unbind(&self, path: &str, owner: &str) -> bool {
        self.routes.remove_if(path, |_, route| route.owner == owner).is_some()
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn InboundListener>> {
        self.routes.get(path).map(|entry| Arc::clone(&entry.value().listener))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[derive(Clone)]
struct ServerState {
    routes: Arc<InboundRoutes>,
    local_addr: SocketAddr,
}

/// HTTP server dispatching inbound requests to request sources.
pub struct InboundServer {
    routes: Arc<InboundRoutes>,
}

impl InboundServer {
    pub fn new(routes: Arc<InboundRoutes>) -> Self {
        Self { routes }
    }

    fn build_router(state: ServerState) -> Router {
        Router::new()
            .route("/{*path}", any(inbound_handler))
            .route("/", any(inbound_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on `listener` until `shutdown` completes.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "Inbound server starting");

        let router = Self::build_router(ServerState {
            routes: self.routes,
            local_addr,
        });

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Inbound server stopped");
        Ok(())
    }
}

async fn inbound_handler(State(state): State<ServerState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();

    let Some(listener) = state.routes.get(&path) else {
        tracing::debug!(path = %path, "No source bound to path");
        return (StatusCode::NOT_FOUND, "No source bound to path").into_response();
    };

    metrics::record_inbound_request(&path);

    let (parts, body) = request.into_parts();
    let info = protocol_info(&parts, state.local_addr);
    let message = RawMessage::new(info, parts.headers, body);

    listener.on_message(message).await.into_response()
}

/// Method, host, port and path of an inbound request.
fn protocol_info(parts: &axum::http::request::Parts, local_addr: SocketAddr) -> ProtocolInfo {
    let authority = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()));

    let (host, port) = match authority.as_deref().and_then(|a| a.parse::<axum::http::uri::Authority>().ok()) {
        Some(authority) => (
            authority.host().to_string(),
            authority.port_u16().unwrap_or(local_addr.port()),
        ),
        None => (local_addr.ip().to_string(), local_addr.port()),
    };

    ProtocolInfo {
        method: parts.method.to_string(),
        host,
        port,
        protocol: "http".to_string(),
        path: parts.uri.path().to_string(),
        status: None,
    }
}
