//! Store-and-forward queue (§4.7): a durable, crash-resumable queue of
//! pending C-STORE jobs sitting in front of the reliability envelope.
//!
//! - [`item`] is the persisted `QueuedStoreItem` and its status DAG.
//! - [`journal`] is the append-only crash-recovery log.
//! - [`store`] lays out `index.log` + per-item `.meta`/`.blob` sidecars.
//! - [`queue`] is the scheduler, admission control, and lifecycle.

pub mod error;
pub mod item;
pub mod journal;
pub mod queue;
pub mod store;

pub use error::Error;
pub use item::{ItemStatus, Priority, QueuedStoreItem};
pub use queue::{DeliveryFailure, Deliverer, Queue, QueueConfig, RunState};
