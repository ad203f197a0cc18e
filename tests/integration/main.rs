//! Integration tests for Pavilion

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A site config, a config dir with test sources and a working dir,
    /// all inside one temp dir.
    struct Site {
        dir: TempDir,
        config_path: PathBuf,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let cfg = dir.path().join("cfg");
            let src = cfg.join("test_src").join("hello");
            fs::create_dir_all(&src).unwrap();
            fs::write(src.join("greeting.txt"), "hello from the source tree\n").unwrap();
            fs::write(cfg.join("test_src").join("extra.txt"), "extra\n").unwrap();

            let config_path = dir.path().join("pavilion.toml");
            fs::write(
                &config_path,
                format!(
                    "working_dir = {:?}\nconfig_dirs = [{:?}]\n\n[locks]\ntimeout_secs = 5\n",
                    dir.path().join("work"),
                    cfg
                ),
            )
            .unwrap();

            Self { dir, config_path }
        }

        fn pav(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("pav");
            cmd.env("PAV_CONFIG", &self.config_path);
            cmd
        }

        fn test_file(&self, name: &str, body: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, body).unwrap();
            path
        }

        fn work(&self) -> PathBuf {
            self.dir.path().join("work")
        }
    }

    const HELLO: &str = r#"
name = "hello"

[build]
source_location = "hello"
extra_files = ["extra.txt"]

[run]
cmds = ["cat greeting.txt extra.txt"]
"#;

    fn create(site: &Site, file: &Path) {
        site.pav()
            .arg("create")
            .arg(file)
            .assert()
            .success()
            .stdout(predicate::str::contains("Created test"));
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("pav")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("HPC test harness"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("pav")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pav"));
    }

    #[test]
    fn config_path_follows_env() {
        let site = Site::new();
        site.pav()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pavilion.toml"));
    }

    #[test]
    fn config_show() {
        let site = Site::new();
        site.pav()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[locks]"))
            .stdout(predicate::str::contains("timeout_secs = 5"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site").join("pavilion.toml");

        cargo_bin_cmd!("pav")
            .env("PAV_CONFIG", &path)
            .args(["config", "init"])
            .assert()
            .success();

        assert!(fs::read_to_string(&path).unwrap().contains("[downloads]"));
    }

    #[test]
    fn list_empty() {
        let site = Site::new();
        site.pav()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No tests"));
    }

    #[test]
    fn create_then_status() {
        let site = Site::new();
        let file = site.test_file("hello.toml", HELLO);

        create(&site, &file);

        assert!(site.work().join("tests/000001/config").is_file());
        site.pav()
            .args(["status", "1", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("000001 CREATED"));
    }

    #[test]
    fn status_json() {
        let site = Site::new();
        let file = site.test_file("hello.toml", HELLO);
        create(&site, &file);

        let output = site
            .pav()
            .args(["status", "--format", "json"])
            .output()
            .unwrap();

        assert!(output.status.success());
        let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(rows[0]["id"], "000001");
        assert_eq!(rows[0]["name"], "hello");
        assert_eq!(rows[0]["status"]["state"], "CREATED");
    }

    #[test]
    fn identical_tests_share_a_build() {
        let site = Site::new();
        let file = site.test_file("hello.toml", HELLO);
        create(&site, &file);
        create(&site, &file);

        site.pav()
            .args(["build", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Built hello-"));
        site.pav()
            .args(["build", "000002"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Reused build hello-"));

        let builds: Vec<_> = fs::read_dir(site.work().join("builds"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| !name.ends_with(".lock"))
            .collect();
        assert_eq!(builds.len(), 1);

        let build = site.work().join("builds").join(&builds[0]);
        assert!(build.join("greeting.txt").is_file());
        assert!(build.join("extra.txt").is_file());
        assert_eq!(
            fs::read_link(site.work().join("tests/000002/build")).unwrap(),
            build
        );
    }

    #[test]
    fn run_writes_log_and_completes() {
        let site = Site::new();
        let file = site.test_file("hello.toml", HELLO);
        create(&site, &file);

        site.pav().args(["run", "1"]).assert().success();

        let log = fs::read_to_string(site.work().join("tests/000001/run.log")).unwrap();
        assert!(log.contains("hello from the source tree"));
        assert!(log.contains("extra"));
        site.pav()
            .args(["status", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("000001 COMPLETE"));
    }

    #[test]
    fn list_counts_finished_tests() {
        let site = Site::new();
        let file = site.test_file("hello.toml", HELLO);
        create(&site, &file);
        create(&site, &file);
        site.pav().args(["run", "1"]).assert().success();

        site.pav()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "2 test(s), 1 complete, 0 failed, 1 unfinished",
            ));
    }

    #[test]
    fn failing_run_exits_nonzero() {
        let site = Site::new();
        let file = site.test_file(
            "fail.toml",
            "name = \"fail\"\n\n[run]\ncmds = [\"exit 3\"]\n",
        );
        create(&site, &file);

        site.pav()
            .args(["run", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("exited with 3"));
        site.pav()
            .args(["status", "1", "--format", "plain"])
            .assert()
            .stdout(predicate::str::contains("RUN_FAILED"));
    }

    #[test]
    fn unknown_scheduler_has_hint() {
        let site = Site::new();
        let file = site.test_file(
            "slurm.toml",
            "name = \"batch\"\nscheduler = \"slurm\"\n",
        );
        create(&site, &file);

        site.pav()
            .args(["run", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No scheduler named 'slurm'"))
            .stderr(predicate::str::contains("Available schedulers: raw"));
    }

    #[test]
    fn missing_source_has_hint() {
        let site = Site::new();
        let file = site.test_file(
            "gone.toml",
            "name = \"gone\"\n\n[build]\nsource_location = \"gone.tar.gz\"\n",
        );

        site.pav()
            .arg("create")
            .arg(&file)
            .assert()
            .failure()
            .stderr(predicate::str::contains("gone.tar.gz"))
            .stderr(predicate::str::contains("test_src"));
    }

    #[test]
    fn build_unknown_test() {
        let site = Site::new();
        site.pav()
            .args(["build", "42"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Test 000042 not found"));
    }

    #[test]
    fn invalid_test_id() {
        let site = Site::new();
        site.pav()
            .args(["status", "abc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid test id"));
    }

    #[test]
    fn invalid_test_config() {
        let site = Site::new();
        let file = site.test_file("bad.json", r#"{"build": {}}"#);

        site.pav()
            .arg("create")
            .arg(&file)
            .assert()
            .failure()
            .stderr(predicate::str::contains("missing 'name'"));
    }
}
