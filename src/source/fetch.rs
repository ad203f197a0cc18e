//! Remote source retrieval
//!
//! A [`Fetcher`] guarantees that after `update` returns, the destination
//! exists and reflects the remote content. How staleness is judged is up
//! to the implementation.

use crate::error::{PavError, PavResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use ureq::Agent;

/// Fetches a URL into a local file
pub trait Fetcher {
    fn update(&self, url: &str, dest: &Path) -> PavResult<()>;
}

/// HTTP(S) fetcher that only re-downloads when the remote copy changed
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }

    fn download_error(url: &str, reason: impl ToString) -> PavError {
        PavError::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn update(&self, url: &str, dest: &Path) -> PavResult<()> {
        let mut request = self.agent.get(url);
        if let Some(since) = if_modified_since(dest) {
            debug!("Conditional fetch of {} (If-Modified-Since: {})", url, since);
            request = request.header("If-Modified-Since", since);
        }

        let response = request
            .call()
            .map_err(|e| Self::download_error(url, e))?;

        if response.status().as_u16() == 304 {
            debug!("{} is up to date", dest.display());
            return Ok(());
        }

        let bytes = write_atomically(&mut response.into_body().into_reader(), dest)
            .map_err(|e| Self::download_error(url, e))?;
        info!("Downloaded {} ({} bytes) to {}", url, bytes, dest.display());
        Ok(())
    }
}

/// Stream `reader` into a uniquely named temp file beside `dest`, then
/// rename it over `dest`. Concurrent writers each get their own temp file;
/// the last rename wins and `dest` is never seen half-written.
fn write_atomically(reader: &mut impl io::Read, dest: &Path) -> io::Result<u64> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut prefix = dest.file_name().unwrap_or_default().to_os_string();
    prefix.push(".");

    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)?;
    let written = io::copy(reader, &mut tmp)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(written)
}

/// HTTP date for an existing cached copy, used to skip unchanged downloads
fn if_modified_since(dest: &Path) -> Option<String> {
    let modified = fs::metadata(dest).ok()?.modified().ok()?;
    let when: DateTime<Utc> = modified.into();
    Some(when.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    /// Serves `body` to `connections` clients, one after another
    fn serve(body: &'static str, connections: usize) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/pkg.tgz", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            for stream in listener.incoming().take(connections) {
                let mut stream = stream.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
                .unwrap();
            }
        });
        (url, handle)
    }

    #[test]
    fn concurrent_downloads_leave_one_whole_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("pkg.tgz");
        let body: &'static str = "tarball bytes ".repeat(64 * 1024).leak();
        let (url, server) = serve(body, 4);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let url = url.clone();
                let dest = dest.clone();
                thread::spawn(move || {
                    HttpFetcher::new(Duration::from_secs(30))
                        .update(&url, &dest)
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        server.join().unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), body);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["pkg.tgz"]);
    }

    #[test]
    fn if_modified_since_needs_existing_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("pkg.tgz");
        assert!(if_modified_since(&dest).is_none());

        fs::write(&dest, "x").unwrap();
        filetime::set_file_mtime(&dest, filetime::FileTime::from_unix_time(784_111_777, 0))
            .unwrap();
        assert_eq!(
            if_modified_since(&dest).unwrap(),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[test]
    fn unreachable_host_is_download_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(2));

        let err = fetcher
            .update("http://127.0.0.1:9/pkg.tgz", &dir.path().join("pkg.tgz"))
            .unwrap_err();

        assert!(matches!(err, PavError::Download { .. }));
        assert!(err.is_retryable());
        assert!(!dir.path().join("pkg.tgz").exists());
    }
}
