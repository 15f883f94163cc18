//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → inbound server stops accepting → pipelines torn down → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
