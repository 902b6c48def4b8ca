//! Run log.
//!
//! Collects the narrative of one publishing run. Every line is also emitted
//! through `tracing` with the run timestamp attached, and the collected lines
//! are written to a markdown file that is uploaded alongside the run's logs.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, warn, Span};

/// Line-oriented log of a publishing run.
///
/// Cheap to clone; clones share the same lines so concurrent upload tasks
/// can write to one log.
#[derive(Debug, Clone)]
pub struct RunLog {
    timestamp: String,
    lines: Arc<Mutex<Vec<String>>>,
}

impl RunLog {
    /// Create a new run log for the run identified by `timestamp`.
    pub fn new(timestamp: &str) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record a line.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(run = %self.timestamp, "{}", message);
        self.push(message);
    }

    /// Record a line that deserves attention.
    pub fn log_warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(run = %self.timestamp, "{}", message);
        self.push(format!("**Warning:** {}", message));
    }

    /// Recorded lines, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Render the log as markdown.
    pub fn render(&self) -> String {
        let mut out = format!("# Blob upload log for {}\n\n", self.timestamp);
        for line in self.lock().iter() {
            out.push_str(line);
            out.push_str("\n\n");
        }
        out
    }

    /// Write the rendered log to `path`, creating the parent directory.
    pub async fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.render()).await
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("publish", run = %self.timestamp)
    }

    fn push(&self, line: String) {
        self.lock().push(line);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_lines() {
        let log = RunLog::new("2020-01-01T00-00-00");
        let clone = log.clone();

        log.log("first");
        clone.log_warning("second");

        assert_eq!(log.lines(), vec!["first", "**Warning:** second"]);
        assert_eq!(clone.timestamp(), "2020-01-01T00-00-00");
    }

    #[test]
    fn test_render() {
        let log = RunLog::new("ts");
        log.log("Uploading a to b");
        assert_eq!(
            log.render(),
            "# Blob upload log for ts\n\nUploading a to b\n\n"
        );
    }

    #[tokio::test]
    async fn test_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("upload-blobs.md");

        let log = RunLog::new("ts");
        log.log("done");
        log.write_to(&path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("done"));
    }
}
