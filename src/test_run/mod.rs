//! Test instance lifecycle
//!
//! Identity allocation, persisted configuration, build linkage and the
//! status log of individual test instances.

pub mod allocator;
pub mod config;
pub mod run;
pub mod status;
pub mod workspace;

pub use allocator::{IdAllocator, TestId, MAX_TEST_ID, TEST_ID_DIGITS};
pub use config::{BuildConfig, TestConfig, DEFAULT_SCHEDULER};
pub use run::TestRun;
pub use status::{StatusLog, StatusRecord, TestState};
pub use workspace::WorkingDir;
