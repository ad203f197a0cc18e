//! Scheduler abstraction
//!
//! A scheduler takes a built test and runs it somewhere. Only the `raw`
//! scheduler, which runs commands on the local host, is built in.

mod factory;
mod raw;

pub use factory::{available_schedulers, create_scheduler};
pub use raw::RawScheduler;

use crate::error::PavResult;
use crate::test_run::{TestConfig, TestId, TestRun, TestState};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Everything a scheduler needs to run one test
#[derive(Debug, Clone)]
pub struct Job {
    pub test_id: TestId,
    /// The test's own directory
    pub test_dir: PathBuf,
    /// Complete build directory, absent when the test has no build
    pub build_path: Option<PathBuf>,
    pub config: TestConfig,
}

impl Job {
    pub fn from_run(run: &TestRun) -> Self {
        Self {
            test_id: run.id(),
            test_dir: run.path().to_path_buf(),
            build_path: run.build_path(),
            config: run.config().clone(),
        }
    }

    /// Directory the test's commands run in
    pub fn work_dir(&self) -> PathBuf {
        self.build_path
            .clone()
            .unwrap_or_else(|| self.test_dir.clone())
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Exit code of the last command run; -1 if it was killed by a signal
    pub exit_code: i32,
    /// File holding the job's output
    pub log_path: PathBuf,
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs built tests
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Name used in test configs to select this scheduler
    fn name(&self) -> &'static str;

    /// Check if the scheduler can run jobs on this host
    async fn is_available(&self) -> PavResult<bool>;

    /// Run `job` to completion
    async fn submit(&self, job: &Job) -> PavResult<JobOutcome>;
}

/// Hand a built test to `scheduler`, recording its progress in the
/// test's status log.
pub async fn dispatch(scheduler: &dyn Scheduler, run: &TestRun) -> PavResult<JobOutcome> {
    let job = Job::from_run(run);
    run.set_status(
        TestState::Scheduled,
        &format!("Submitted to {}", scheduler.name()),
    )?;
    run.set_status(TestState::Running, &format!("in {}", job.work_dir().display()))?;

    let outcome = match scheduler.submit(&job).await {
        Ok(outcome) => outcome,
        Err(e) => {
            run.set_status(TestState::RunFailed, &e.to_string())?;
            return Err(e);
        }
    };

    if outcome.success() {
        run.set_status(TestState::Complete, "exit 0")?;
    } else {
        run.set_status(
            TestState::RunFailed,
            &format!("exit {}, see {}", outcome.exit_code, outcome.log_path.display()),
        )?;
    }
    info!("Test {} finished with exit code {}", run.id(), outcome.exit_code);
    Ok(outcome)
}
