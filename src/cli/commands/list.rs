//! List command - all test instances in the working directory

use crate::cli::args::{ListArgs, OutputFormat};
use crate::cli::commands::status::{summaries, tally, TestSummary};
use crate::config::Config;
use crate::error::PavResult;
use crate::test_run::{TestState, WorkingDir};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> PavResult<()> {
    let rows = summaries(WorkingDir::from_config(config), Vec::new()).await?;

    if rows.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(&UiContext::detect(), "No tests"),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.id);
            }
        }
    }
    Ok(())
}

fn print_table(rows: &[TestSummary]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Tests");

    println!(
        "{:<8} {:<24} {:<14} {}",
        style("ID").bold(),
        style("NAME").bold(),
        style("STATE").bold(),
        style("BUILD").bold()
    );
    println!("{}", "-".repeat(72));

    for row in rows {
        println!(
            "{:<8} {:<24} {:<14} {}",
            row.id,
            row.name,
            ui::state_style(row.status.state),
            row.build.as_deref().unwrap_or("-")
        );
    }

    println!();
    let finished = rows
        .iter()
        .filter(|row| row.status.state.is_terminal())
        .count();
    let complete = tally(rows, TestState::Complete);
    println!(
        "{} test(s), {} complete, {} failed, {} unfinished",
        rows.len(),
        complete,
        finished - complete,
        rows.len() - finished
    );
}
