//! Work-stealing worker pool plus parallel/sequential/matrix scheduling
//! strategies for running a suite's work items across one or more browsers.

pub mod error;
pub mod scheduler;
pub mod worker_pool;

pub use error::SchedulerError;
pub use scheduler::{cell_status, Filters, Scheduler};
pub use worker_pool::{
    Cleanup, ExecStatus, ExecutionResult, Executor, Spawner, WorkItem, WorkerInfo, WorkerPool,
    WorkerStatus,
};
