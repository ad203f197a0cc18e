//! Create command - allocate a test instance from a config file

use crate::cli::args::CreateArgs;
use crate::cli::commands::blocking;
use crate::config::Config;
use crate::error::PavResult;
use crate::source::HttpFetcher;
use crate::test_run::{TestConfig, TestRun, WorkingDir};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the create command
pub async fn execute(args: CreateArgs, config: &Config) -> PavResult<()> {
    let ctx = UiContext::detect();
    let ws = WorkingDir::from_config(config);
    let fetcher = HttpFetcher::new(config.downloads.timeout());
    let file = args.file.clone();

    let test_config = blocking(move || TestConfig::from_file(&file)).await?;
    let name = test_config.name();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Creating test {}", name));
    let created = blocking({
        let ws = ws.clone();
        move || {
            let mut run = TestRun::create(&ws, test_config, &fetcher)?;
            let outcome = if args.build {
                run.build(&ws, &fetcher)?
            } else {
                None
            };
            Ok((run, outcome))
        }
    })
    .await;

    let (run, outcome) = match created {
        Ok(created) => created,
        Err(e) => {
            spinner.stop_error(&format!("Could not create test {}", name));
            return Err(e);
        }
    };
    spinner.stop(&format!("Created test {} ({})", run.id(), name));

    if let Some(build_name) = run.build_name() {
        ui::remark(&ctx, &format!("build {}", build_name));
    }
    if let Some(outcome) = outcome {
        let verb = if outcome.reused { "Reused" } else { "Built" };
        ui::step_ok_detail(&ctx, verb, &outcome.path.display().to_string());
    }

    Ok(())
}
