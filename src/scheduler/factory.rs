//! Scheduler lookup by name

use crate::error::{PavError, PavResult};
use crate::scheduler::raw::RawScheduler;
use crate::scheduler::Scheduler;

/// Names accepted by [`create_scheduler`]
pub fn available_schedulers() -> &'static [&'static str] {
    &[RawScheduler::NAME]
}

/// Create the scheduler a test config names
pub fn create_scheduler(name: &str) -> PavResult<Box<dyn Scheduler>> {
    match name {
        RawScheduler::NAME => Ok(Box::new(RawScheduler::new())),
        other => Err(PavError::SchedulerNotFound(other.to_string())),
    }
}
