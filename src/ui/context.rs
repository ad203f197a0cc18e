//! Interactive terminal detection

use std::io::IsTerminal;

/// Environment variables set by batch schedulers and CI systems
const BATCH_VARS: &[&str] = &[
    "CI",
    "SLURM_JOB_ID",
    "PBS_JOBID",
    "LSB_JOBID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_URL",
];

/// Whether output may use spinners and colors
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Interactive only when both stdin and stdout are terminals and no
    /// batch or CI job is running.
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
        let batch = BATCH_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: tty && !batch,
        }
    }

    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
