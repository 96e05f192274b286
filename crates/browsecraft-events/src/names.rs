//! The fixed set of event names the scheduler and worker pool emit.
//! Plain constants rather than an enum: callers may still `emit` an
//! arbitrary name (useful for test doubles and future extensions), so a
//! closed enum would fight the API rather than help it.

pub const RUN_START: &str = "run:start";
pub const RUN_END: &str = "run:end";
pub const BROWSER_START: &str = "browser:start";
pub const BROWSER_END: &str = "browser:end";
pub const WORKER_SPAWN: &str = "worker:spawn";
pub const WORKER_READY: &str = "worker:ready";
pub const WORKER_BUSY: &str = "worker:busy";
pub const WORKER_IDLE: &str = "worker:idle";
pub const WORKER_TERMINATE: &str = "worker:terminate";
pub const WORKER_ERROR: &str = "worker:error";
pub const ITEM_ENQUEUE: &str = "item:enqueue";
pub const ITEM_START: &str = "item:start";
pub const ITEM_PASS: &str = "item:pass";
pub const ITEM_FAIL: &str = "item:fail";
pub const ITEM_SKIP: &str = "item:skip";
pub const ITEM_RETRY: &str = "item:retry";
pub const ITEM_END: &str = "item:end";
pub const PROGRESS: &str = "progress";
