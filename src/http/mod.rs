//! HTTP transport adapter.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     sink event
//!     → headers.rs (header list, content-type policy, content-length)
//!     → client.rs (Transport::send)
//!     → message.rs (RawMessage: status, headers, body)
//!
//! Inbound:
//!     TCP connection
//!     → server.rs (Axum router, path lookup)
//!     → InboundListener::on_message(RawMessage)
//!     → HttpReply written back
//! ```

pub mod client;
pub mod headers;
pub mod message;
pub mod server;

pub use client::{HyperTransport, OutboundRequest, Transport};
pub use headers::{Header, MappingType};
pub use message::{HttpReply, RawMessage};
pub use server::{InboundListener, InboundRoutes, InboundServer};
