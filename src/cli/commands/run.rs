//! Run command - build a test and hand it to its scheduler

use crate::cli::args::RunArgs;
use crate::cli::commands::build::{build_test, describe};
use crate::config::Config;
use crate::error::{PavError, PavResult};
use crate::scheduler::{create_scheduler, dispatch};
use crate::source::HttpFetcher;
use crate::test_run::{TestId, WorkingDir};
use crate::ui::{self, TaskSpinner, UiContext};
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> PavResult<()> {
    let ctx = UiContext::detect();
    let id: TestId = args.id.parse()?;
    let ws = WorkingDir::from_config(config);
    let fetcher = HttpFetcher::new(config.downloads.timeout());

    let (run, outcome) = build_test(ws, fetcher, id).await?;
    if let Some(outcome) = &outcome {
        ui::step_ok(&ctx, &describe(&run, outcome));
    }

    let scheduler = create_scheduler(run.config().scheduler())?;
    if !scheduler.is_available().await? {
        return Err(PavError::User(format!(
            "Scheduler '{}' is not available on this host",
            scheduler.name()
        )));
    }
    debug!("Dispatching test {} to {}", id, scheduler.name());

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Running test {} ({})", id, run.name()));
    let job = dispatch(scheduler.as_ref(), &run).await;

    match job {
        Ok(job) if job.success() => {
            spinner.stop(&format!("Test {} complete", id));
            ui::remark(&ctx, &job.log_path.display().to_string());
            Ok(())
        }
        Ok(job) => {
            spinner.stop_error(&format!("Test {} failed", id));
            Err(PavError::User(format!(
                "Test {} exited with {}; output is in {}",
                id,
                job.exit_code,
                job.log_path.display()
            )))
        }
        Err(e) => {
            spinner.stop_error(&format!("Test {} could not run", id));
            Err(e)
        }
    }
}
