//! A synchronous, in-process, typed pub/sub bus used by the worker pool
//! and scheduler to report run/browser/worker/item lifecycle events.

pub mod bus;
pub mod names;

pub use bus::{EventBus, Handler, HistoryEntry, Unsubscribe};
