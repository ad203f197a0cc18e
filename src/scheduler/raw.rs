//! Local execution scheduler
//!
//! Runs each of a test's `run.cmds` with `sh -c`, one after another, in the
//! build directory (or the test directory when there is no build). Output
//! from every command goes to `tests/<id>/run.log`. The first failing
//! command ends the job.

use crate::error::{PavError, PavResult};
use crate::scheduler::{Job, JobOutcome, Scheduler};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Output log written next to the test's status file
pub const RUN_LOG: &str = "run.log";

/// Scheduler that runs tests directly on this host
#[derive(Debug, Default)]
pub struct RawScheduler;

impl RawScheduler {
    pub const NAME: &'static str = "raw";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scheduler for RawScheduler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn is_available(&self) -> PavResult<bool> {
        Ok(Command::new("sh")
            .args(["-c", "true"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false))
    }

    async fn submit(&self, job: &Job) -> PavResult<JobOutcome> {
        let log_path = job.test_dir.join(RUN_LOG);
        let work_dir = job.work_dir();
        let cmds = job.config.run_cmds();

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .map_err(|e| PavError::io(format!("opening {}", log_path.display()), e))?;

        if cmds.is_empty() {
            warn!("Test {} has no run.cmds", job.test_id);
        }

        info!(
            "Running test {} ({} commands) in {}",
            job.test_id,
            cmds.len(),
            work_dir.display()
        );

        let mut exit_code = 0;
        for cmd in &cmds {
            log.write_all(format!("$ {}\n", cmd).as_bytes())
                .await
                .map_err(|e| PavError::io(format!("writing {}", log_path.display()), e))?;
            log.flush()
                .await
                .map_err(|e| PavError::io(format!("writing {}", log_path.display()), e))?;

            let stdout = log
                .try_clone()
                .await
                .map_err(|e| PavError::io(format!("cloning {}", log_path.display()), e))?
                .into_std()
                .await;
            let stderr = stdout
                .try_clone()
                .map_err(|e| PavError::io(format!("cloning {}", log_path.display()), e))?;

            debug!("Executing: sh -c {:?}", cmd);
            let status = Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .current_dir(&work_dir)
                .env("PAV_TEST_ID", job.test_id.to_string())
                .env("PAV_TEST_DIR", &job.test_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::from(stdout))
                .stderr(Stdio::from(stderr))
                .status()
                .await
                .map_err(|e| PavError::command_failed(format!("sh -c {}", cmd), e))?;

            exit_code = status.code().unwrap_or(-1);
            if exit_code != 0 {
                warn!("Command '{}' exited with {}", cmd, exit_code);
                break;
            }
        }

        Ok(JobOutcome {
            exit_code,
            log_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_run::{TestConfig, TestId};
    use std::path::Path;
    use tempfile::TempDir;

    fn job(dir: &Path, build: Option<&Path>, cmds: &str) -> Job {
        let test_dir = dir.join("000001");
        std::fs::create_dir_all(&test_dir).unwrap();
        Job {
            test_id: TestId::new(1).unwrap(),
            test_dir,
            build_path: build.map(Path::to_path_buf),
            config: TestConfig::from_json(&format!(
                r#"{{"name": "t", "run": {{"cmds": {}}}}}"#,
                cmds
            ))
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn raw_scheduler_is_available() {
        assert!(RawScheduler::new().is_available().await.unwrap());
    }

    #[tokio::test]
    async fn runs_commands_in_build_dir() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        std::fs::create_dir_all(&build).unwrap();
        std::fs::write(build.join("input.txt"), "from the build").unwrap();
        let job = job(
            dir.path(),
            Some(&build),
            r#"["cat input.txt", "echo id=$PAV_TEST_ID"]"#,
        );

        let outcome = RawScheduler::new().submit(&job).await.unwrap();

        assert!(outcome.success());
        let log = std::fs::read_to_string(&outcome.log_path).unwrap();
        assert!(log.contains("$ cat input.txt"));
        assert!(log.contains("from the build"));
        assert!(log.contains("id=1"));
    }

    #[tokio::test]
    async fn runs_in_test_dir_without_build() {
        let dir = TempDir::new().unwrap();
        let job = job(dir.path(), None, r#"["touch marker"]"#);

        RawScheduler::new().submit(&job).await.unwrap();

        assert!(job.test_dir.join("marker").is_file());
    }

    #[tokio::test]
    async fn first_failure_stops_the_job() {
        let dir = TempDir::new().unwrap();
        let job = job(
            dir.path(),
            None,
            r#"["echo one", "echo oops >&2; exit 3", "touch never"]"#,
        );

        let outcome = RawScheduler::new().submit(&job).await.unwrap();

        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.success());
        assert!(!job.test_dir.join("never").exists());
        let log = std::fs::read_to_string(&outcome.log_path).unwrap();
        assert!(log.contains("oops"));
    }

    #[tokio::test]
    async fn no_commands_succeeds() {
        let dir = TempDir::new().unwrap();
        let job = job(dir.path(), None, "[]");

        let outcome = RawScheduler::new().submit(&job).await.unwrap();

        assert!(outcome.success());
        assert!(outcome.log_path.exists());
    }
}
