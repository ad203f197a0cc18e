//! Terminal output for the `pav` CLI
//!
//! Uses `cliclack` on an interactive terminal and falls back to plain
//! bracketed markers (`[OK]`, `[WARN]`) in pipes and CI, so output stays
//! greppable in batch job logs.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{intro, remark, state_style, step_info, step_ok, step_ok_detail, step_warn};
pub use progress::TaskSpinner;
