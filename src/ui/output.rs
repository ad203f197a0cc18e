use super::context::UiContext;
use crate::test_run::TestState;
use console::{style, StyledObject};

pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        println!("{} {} ({})", style("[OK]").green(), message, detail);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(message).ok();
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("{} {}", style("[INFO]").cyan(), message);
    }
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// A state code colored by how the test is doing
pub fn state_style(state: TestState) -> StyledObject<&'static str> {
    let text = style(state.as_str());
    match state {
        TestState::Complete | TestState::BuildDone | TestState::BuildReused => text.green(),
        TestState::BuildFailed | TestState::RunFailed => text.red(),
        TestState::Building | TestState::Scheduled | TestState::Running => text.yellow(),
        TestState::Created => text.cyan(),
        TestState::Unknown => text.dim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_non_interactive() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "Tests");
        step_ok(&ctx, "Built");
        step_warn(&ctx, "Reused");
        step_info(&ctx, "Nothing to build");
    }

    #[test]
    fn state_style_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(state_style(TestState::RunFailed).to_string(), "RUN_FAILED");
    }
}
