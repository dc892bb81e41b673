//! Background maintenance tasks.
//!
//! Schedulers follow the same runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout on join

pub mod error;
pub mod sweep_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sweep_scheduler::{SweepScheduler, SweepSchedulerConfig};
