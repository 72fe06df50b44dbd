//! Job scheduling subsystem for epg-merge
//!
//! Two components:
//! - `JobController`: single-flight execution of merge attempts, job history,
//!   crash recovery and cancellation
//! - `JobScheduler`: cron-style loop that fires scheduled attempts

pub mod controller;
pub mod job_scheduler;
pub mod types;

pub use controller::JobController;
pub use job_scheduler::JobScheduler;
pub use types::*;
