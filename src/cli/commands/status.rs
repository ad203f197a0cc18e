//! Status command - last status record of each test

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::commands::blocking;
use crate::config::Config;
use crate::error::PavResult;
use crate::test_run::{StatusRecord, TestId, TestRun, TestState, WorkingDir};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use tracing::warn;

/// One row of `status` and `list` output
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TestSummary {
    pub id: String,
    pub name: String,
    pub build: Option<String>,
    pub status: StatusRecord,
}

impl TestSummary {
    fn load(ws: &WorkingDir, id: TestId) -> PavResult<Self> {
        let run = TestRun::load(ws, id)?;
        Ok(Self {
            id: id.dir_name(),
            name: run.name(),
            build: run.build_name(),
            status: run.status()?,
        })
    }
}

/// Summaries for `ids`, or for every test when `ids` is empty.
///
/// Explicitly requested tests that cannot be loaded are errors; damaged
/// tests found while listing everything are skipped with a warning.
pub(crate) async fn summaries(ws: WorkingDir, ids: Vec<TestId>) -> PavResult<Vec<TestSummary>> {
    blocking(move || {
        if !ids.is_empty() {
            return ids.into_iter().map(|id| TestSummary::load(&ws, id)).collect();
        }

        let mut rows = Vec::new();
        for id in ws.test_ids()? {
            match TestSummary::load(&ws, id) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping test {}: {}", id, e),
            }
        }
        Ok(rows)
    })
    .await
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> PavResult<()> {
    let ids = args
        .ids
        .iter()
        .map(|id| id.parse())
        .collect::<PavResult<Vec<TestId>>>()?;
    let rows = summaries(WorkingDir::from_config(config), ids).await?;

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{} {}", row.id, row.status.state);
            }
        }
    }
    Ok(())
}

fn print_table(rows: &[TestSummary]) {
    let ctx = UiContext::detect();
    if rows.is_empty() {
        ui::step_info(&ctx, "No tests");
        return;
    }

    println!(
        "{:<8} {:<24} {:<14} {:<20} {}",
        style("ID").bold(),
        style("NAME").bold(),
        style("STATE").bold(),
        style("TIME").bold(),
        style("MESSAGE").bold()
    );
    for row in rows {
        let when = row
            .status
            .when
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<24} {:<14} {:<20} {}",
            row.id,
            row.name,
            ui::state_style(row.status.state),
            when,
            row.status.message
        );
    }
}

/// Count of rows per state, for the list footer
pub(crate) fn tally(rows: &[TestSummary], state: TestState) -> usize {
    rows.iter().filter(|row| row.status.state == state).count()
}
