//! CLI command implementations

pub mod build;
pub mod config;
pub mod create;
pub mod list;
pub mod run;
pub mod status;

pub use build::execute as build;
pub use config::execute as config;
pub use create::execute as create;
pub use list::execute as list;
pub use run::execute as run;
pub use status::execute as status;

use crate::error::{PavError, PavResult};

/// Run filesystem-heavy core work (locking, hashing, extraction) off the
/// async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> PavResult<T>
where
    F: FnOnce() -> PavResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PavError::Internal(format!("blocking task failed: {}", e)))?
}
