//! Test configuration
//!
//! A test's config is an arbitrary mapping, persisted once at creation and
//! read back verbatim. Only a few keys are interpreted here.

use crate::error::{PavError, PavResult};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Scheduler used when a config does not name one
pub const DEFAULT_SCHEDULER: &str = "raw";

/// Immutable test configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    raw: Map<String, Value>,
}

impl TestConfig {
    /// Wrap a mapping, checking the keys this crate relies on
    pub fn new(raw: Map<String, Value>) -> PavResult<Self> {
        match raw.get("name") {
            Some(Value::String(name)) => check_name_part("name", name)?,
            Some(_) => return Err(PavError::TestConfig("'name' must be a string".to_string())),
            None => return Err(PavError::TestConfig("missing 'name'".to_string())),
        }
        match raw.get("subtest") {
            None | Some(Value::Null) => {}
            Some(Value::String(subtest)) if subtest.is_empty() => {}
            Some(Value::String(subtest)) => check_name_part("subtest", subtest)?,
            Some(_) => {
                return Err(PavError::TestConfig("'subtest' must be a string".to_string()));
            }
        }
        if let Some(build) = raw.get("build") {
            if !build.is_object() {
                return Err(PavError::TestConfig("'build' must be a mapping".to_string()));
            }
        }

        let config = Self { raw };
        config.build()?;
        Ok(config)
    }

    /// Parse from JSON text
    pub fn from_json(text: &str) -> PavResult<Self> {
        match serde_json::from_str(text)? {
            Value::Object(raw) => Self::new(raw),
            _ => Err(PavError::TestConfig("config must be a mapping".to_string())),
        }
    }

    /// Load a config file; `.json` files are JSON, anything else TOML
    pub fn from_file(path: &Path) -> PavResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PavError::io(format!("reading test config {}", path.display()), e))?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let result = if is_json {
            Self::from_json(&text)
        } else {
            let raw: Map<String, Value> = toml::from_str(&text)?;
            Self::new(raw)
        };

        result.map_err(|e| PavError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Test name: `name`, or `name.subtest` when a subtest is set
    pub fn name(&self) -> String {
        let name = self.raw.get("name").and_then(Value::as_str).unwrap_or_default();
        match self.raw.get("subtest").and_then(Value::as_str) {
            Some(subtest) if !subtest.is_empty() => format!("{}.{}", name, subtest),
            _ => name.to_string(),
        }
    }

    /// The build section, if the test has one
    pub fn build(&self) -> PavResult<Option<BuildConfig>> {
        match self.raw.get("build") {
            Some(Value::Object(map)) => BuildConfig::from_map(map).map(Some),
            _ => Ok(None),
        }
    }

    /// Name of the scheduler that runs this test
    pub fn scheduler(&self) -> &str {
        self.raw
            .get("scheduler")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SCHEDULER)
    }

    /// Shell commands from `run.cmds`
    pub fn run_cmds(&self) -> Vec<String> {
        self.raw
            .get("run")
            .and_then(|run| run.get("cmds"))
            .and_then(Value::as_array)
            .map(|cmds| {
                cmds.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Pretty JSON, as persisted in a test's `config` file
    pub fn to_json(&self) -> PavResult<String> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }
}

/// Typed view of a test's `build` section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildConfig {
    /// The whole section, as hashed into the build key
    pub raw: Map<String, Value>,
    pub source_location: Option<String>,
    pub source_download_name: Option<String>,
    pub extra_files: Vec<String>,
    pub specificity: String,
}

impl BuildConfig {
    pub fn from_map(map: &Map<String, Value>) -> PavResult<Self> {
        let extra_files = match map.get("extra_files") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        PavError::TestConfig("'build.extra_files' must be strings".to_string())
                    })
                })
                .collect::<PavResult<_>>()?,
            Some(_) => {
                return Err(PavError::TestConfig(
                    "'build.extra_files' must be a list".to_string(),
                ))
            }
        };

        Ok(Self {
            raw: map.clone(),
            source_location: optional_str(map, "source_location")?,
            source_download_name: optional_str(map, "source_download_name")?,
            extra_files,
            specificity: optional_str(map, "specificity")?.unwrap_or_default(),
        })
    }
}

/// Test names end up in build directory names, so they must be a single
/// path component.
fn check_name_part(key: &str, value: &str) -> PavResult<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\0']) {
        return Err(PavError::TestConfig(format!(
            "'{}' must be a non-empty file name without '/', got '{}'",
            key,
            value.escape_default()
        )));
    }
    Ok(())
}

fn optional_str(map: &Map<String, Value>, key: &str) -> PavResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(PavError::TestConfig(format!(
            "'build.{}' must be a string",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn name_with_subtest() {
        let config = TestConfig::from_json(r#"{"name": "hpl", "subtest": "small"}"#).unwrap();
        assert_eq!(config.name(), "hpl.small");

        let config = TestConfig::from_json(r#"{"name": "hpl", "subtest": ""}"#).unwrap();
        assert_eq!(config.name(), "hpl");
    }

    #[test]
    fn name_is_required() {
        assert!(matches!(
            TestConfig::from_json(r#"{"build": {}}"#),
            Err(PavError::TestConfig(_))
        ));
        assert!(matches!(
            TestConfig::from_json(r#"{"name": 3}"#),
            Err(PavError::TestConfig(_))
        ));
    }

    #[test]
    fn names_must_be_one_path_component() {
        for name in ["", ".", "..", "../../escape", "suite/hpl", "nul\0byte"] {
            let json = serde_json::json!({"name": name, "build": {}}).to_string();
            assert!(
                matches!(TestConfig::from_json(&json), Err(PavError::TestConfig(_))),
                "name {name:?} should be rejected"
            );
        }
        for subtest in ["..", "a/b"] {
            let json = serde_json::json!({"name": "hpl", "subtest": subtest}).to_string();
            assert!(
                matches!(TestConfig::from_json(&json), Err(PavError::TestConfig(_))),
                "subtest {subtest:?} should be rejected"
            );
        }
        assert!(TestConfig::from_json(r#"{"name": "hpl-2.3_small", "subtest": "n.1"}"#).is_ok());
    }

    #[test]
    fn build_section_parsed() {
        let config = TestConfig::from_json(
            r#"{"name": "stream", "build": {
                "source_location": "stream.tgz",
                "extra_files": ["patch.diff", "Makefile.local"],
                "specificity": "haswell"
            }}"#,
        )
        .unwrap();

        let build = config.build().unwrap().unwrap();
        assert_eq!(build.source_location.as_deref(), Some("stream.tgz"));
        assert_eq!(build.extra_files, vec!["patch.diff", "Makefile.local"]);
        assert_eq!(build.specificity, "haswell");
        assert_eq!(build.raw.len(), 3);
    }

    #[test]
    fn no_build_section() {
        let config = TestConfig::from_json(r#"{"name": "hostname"}"#).unwrap();
        assert!(config.build().unwrap().is_none());
        assert_eq!(config.scheduler(), DEFAULT_SCHEDULER);
        assert!(config.run_cmds().is_empty());
    }

    #[test]
    fn bad_extra_files_rejected() {
        assert!(TestConfig::from_json(r#"{"name": "t", "build": {"extra_files": "a"}}"#).is_err());
        assert!(TestConfig::from_json(r#"{"name": "t", "build": {"extra_files": [1]}}"#).is_err());
    }

    #[test]
    fn toml_file_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hpl.toml");
        fs::write(
            &path,
            r#"
                name = "hpl"
                scheduler = "raw"

                [build]
                source_location = "hpl-2.3.tar.gz"

                [run]
                cmds = ["./xhpl"]
            "#,
        )
        .unwrap();

        let config = TestConfig::from_file(&path).unwrap();
        assert_eq!(config.name(), "hpl");
        assert_eq!(config.run_cmds(), vec!["./xhpl"]);
        assert!(config.build().unwrap().is_some());
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"subtest": "x"}"#).unwrap();

        match TestConfig::from_file(&path) {
            Err(PavError::ConfigInvalid { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn json_roundtrip_is_verbatim() {
        let config =
            TestConfig::from_json(r#"{"name": "a", "zeta": [1, 2], "alpha": {"x": true}}"#)
                .unwrap();
        let reloaded = TestConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, reloaded);
    }
}
