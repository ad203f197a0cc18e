//! Build command - make sure a test's build exists

use crate::cache::BuildOutcome;
use crate::cli::args::BuildArgs;
use crate::cli::commands::blocking;
use crate::config::Config;
use crate::error::PavResult;
use crate::source::HttpFetcher;
use crate::test_run::{TestId, TestRun, WorkingDir};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> PavResult<()> {
    let ctx = UiContext::detect();
    let id: TestId = args.id.parse()?;
    let ws = WorkingDir::from_config(config);
    let fetcher = HttpFetcher::new(config.downloads.timeout());

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Building test {}", id));

    match build_test(ws, fetcher, id).await {
        Ok((run, Some(outcome))) => {
            spinner.stop(&describe(&run, &outcome));
            ui::remark(&ctx, &outcome.path.display().to_string());
            Ok(())
        }
        Ok((run, None)) => {
            spinner.stop(&format!("Test {} ({}) has nothing to build", id, run.name()));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Build of test {} failed", id));
            Err(e)
        }
    }
}

/// Load and build a test off the async runtime
pub(crate) async fn build_test(
    ws: WorkingDir,
    fetcher: HttpFetcher,
    id: TestId,
) -> PavResult<(TestRun, Option<BuildOutcome>)> {
    blocking(move || {
        let mut run = TestRun::load(&ws, id)?;
        let outcome = run.build(&ws, &fetcher)?;
        Ok((run, outcome))
    })
    .await
}

pub(crate) fn describe(run: &TestRun, outcome: &BuildOutcome) -> String {
    let build = run.build_name().unwrap_or_default();
    if outcome.reused {
        format!("Reused build {} for test {}", build, run.id())
    } else {
        format!("Built {} for test {}", build, run.id())
    }
}
