//! Correlation subsystem.
//!
//! # Data Flow
//! ```text
//! element init
//!     → key.rs (owner id [+ status refinement])
//!     → registry.rs register (fails on duplicate key)
//!
//! response arrives
//!     → registry.rs resolve (refined key, then unrefined)
//!     → listener.deliver(event)
//!
//! element teardown
//!     → registry.rs unregister (owner-scoped) → listener.disconnect()
//! ```

pub mod key;
pub mod registry;

pub use key::CorrelationKey;
pub use registry::{Listener, RegisteredListener, ResponseListener, ResponseRegistry};
