//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     InboundListener::on_message
//!     → pool.rs (WorkerPool::submit)
//!     → worker.rs (read body, build metadata)
//!     → EventConsumer
//!
//! Outbound:
//!     Transport::send resolves
//!     → pool.rs (WorkerPool::submit)
//!     → delivery.rs (read body or download, build metadata)
//!     → DeliveryTarget (direct consumer, or registry lookup)
//!     → PendingSend resolves (Delivered | Failed)
//! ```

pub mod delivery;
pub mod pool;
pub mod worker;

pub use delivery::{DeliveryOutcome, DeliveryTarget, PendingSend, ResponseDelivery, SendState};
pub use pool::WorkerPool;
pub use worker::{DispatchOutcome, DispatchWorker};
