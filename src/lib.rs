//! Pavilion - HPC test harness
//!
//! Gives each test instance a unique on-disk identity, builds it through a
//! content-addressed build cache shared by every process on the cluster
//! filesystem, and tracks its lifecycle in an append-only status log.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod lock;
pub mod scheduler;
pub mod source;
pub mod test_run;
pub mod ui;

pub use error::{PavError, PavResult};
