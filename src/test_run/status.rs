//! Per-test status log
//!
//! Each line is `<RFC 3339 timestamp> <STATE> [message]`. The file is only
//! ever appended to; the current status is its last line.

use crate::error::{PavError, PavResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Bytes read from the end of the log before growing the window
const TAIL_WINDOW: u64 = 4096;

/// Lifecycle state of a test instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestState {
    Created,
    Building,
    BuildDone,
    BuildReused,
    BuildFailed,
    Scheduled,
    Running,
    Complete,
    RunFailed,
    Unknown,
}

impl TestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Building => "BUILDING",
            Self::BuildDone => "BUILD_DONE",
            Self::BuildReused => "BUILD_REUSED",
            Self::BuildFailed => "BUILD_FAILED",
            Self::Scheduled => "SCHEDULED",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::RunFailed => "RUN_FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// True once nothing more will happen to the test
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::BuildFailed | Self::Complete | Self::RunFailed)
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TestState {
    type Err = PavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "CREATED" => Self::Created,
            "BUILDING" => Self::Building,
            "BUILD_DONE" => Self::BuildDone,
            "BUILD_REUSED" => Self::BuildReused,
            "BUILD_FAILED" => Self::BuildFailed,
            "SCHEDULED" => Self::Scheduled,
            "RUNNING" => Self::Running,
            "COMPLETE" => Self::Complete,
            "RUN_FAILED" => Self::RunFailed,
            "UNKNOWN" => Self::Unknown,
            other => return Err(PavError::User(format!("unknown state '{}'", other))),
        };
        Ok(state)
    }
}

/// One line of a status log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    /// Absent only for unreadable lines
    pub when: Option<DateTime<Utc>>,
    pub state: TestState,
    pub message: String,
}

impl StatusRecord {
    fn unknown(message: impl Into<String>) -> Self {
        Self {
            when: None,
            state: TestState::Unknown,
            message: message.into(),
        }
    }

    /// Parse a line positionally: timestamp, state, then the rest
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, ' ');
        let when = parse_timestamp(parts.next()?)?;
        let state = parts.next()?.parse().ok()?;
        let message = parts.next().unwrap_or_default().to_string();
        Some(Self {
            when: Some(when),
            state,
            message,
        })
    }

    fn to_line(&self) -> String {
        let when = self
            .when
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_else(|| "?".to_string());
        if self.message.is_empty() {
            format!("{} {}\n", when, self.state)
        } else {
            format!("{} {} {}\n", when, self.state, self.message)
        }
    }
}

/// RFC 3339, or a bare ISO-8601 date-time taken as UTC
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}

/// A test's `status` file
#[derive(Debug, Clone)]
pub struct StatusLog {
    path: PathBuf,
}

impl StatusLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record stamped with the current time.
    ///
    /// Newlines in `message` are replaced so the record stays one line.
    pub fn append(&self, state: TestState, message: &str) -> PavResult<StatusRecord> {
        let record = StatusRecord {
            when: Some(Utc::now().trunc_subsecs(6)),
            state,
            message: message.replace(['\n', '\r'], " "),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PavError::io(format!("opening {}", self.path.display()), e))?;
        // A single write keeps concurrent appends from interleaving.
        file.write_all(record.to_line().as_bytes())
            .map_err(|e| PavError::io(format!("appending to {}", self.path.display()), e))?;

        debug!("{}: {}", self.path.display(), record.state);
        Ok(record)
    }

    /// The most recent record.
    ///
    /// An empty or missing log, or a malformed last line, reads as
    /// `UNKNOWN`; only I/O failures are errors.
    pub fn last(&self) -> PavResult<StatusRecord> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(StatusRecord::unknown("no status recorded"));
            }
            Err(e) => {
                return Err(PavError::io(format!("opening {}", self.path.display()), e));
            }
        };

        let line = last_line(&mut file)
            .map_err(|e| PavError::io(format!("reading {}", self.path.display()), e))?;
        let Some(line) = line else {
            return Ok(StatusRecord::unknown("no status recorded"));
        };

        match StatusRecord::parse(&line) {
            Some(record) => Ok(record),
            None => {
                warn!(
                    "Bad status line in status file '{}': '{}'",
                    self.path.display(),
                    line
                );
                Ok(StatusRecord::unknown(format!("bad status line: {}", line)))
            }
        }
    }
}

/// Last non-empty line of `file`, reading backward from the end in a
/// window that doubles until it holds a whole line.
fn last_line(file: &mut File) -> io::Result<Option<String>> {
    let len = file.metadata()?.len();
    let mut window = TAIL_WINDOW;

    loop {
        let start = len.saturating_sub(window);
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity((len - start) as usize);
        Read::by_ref(&mut *file).take(len - start).read_to_end(&mut buf)?;

        let mut end = buf.len();
        while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let tail = &buf[..end];

        match tail.iter().rposition(|b| *b == b'\n') {
            Some(pos) => return Ok(Some(String::from_utf8_lossy(&tail[pos + 1..]).into_owned())),
            None if start == 0 => {
                return Ok((!tail.is_empty()).then(|| String::from_utf8_lossy(tail).into_owned()));
            }
            None => window = window.saturating_mul(2),
        }
    }
}
