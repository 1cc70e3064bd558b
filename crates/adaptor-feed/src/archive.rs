//! On-disk copies of transmitted feeds

use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::maker::FeedFile;

/// Whether the archived feed was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Success,
    Failed,
}

impl fmt::Display for ArchiveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveOutcome::Success => write!(f, "success"),
            ArchiveOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Writes each feed to `<dir>/<datasource>-<timestamp>-<seq>-<outcome>.xml`
#[derive(Debug)]
pub struct FeedArchiver {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl FeedArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive a feed. Failures are logged and never reach the caller.
    pub async fn archive(&self, feed: &FeedFile, outcome: ArchiveOutcome) -> Option<PathBuf> {
        match self.write(feed, outcome).await {
            Ok(path) => {
                debug!(path = %path.display(), "Archived feed");
                Some(path)
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to archive feed");
                None
            }
        }
    }

    async fn write(&self, feed: &FeedFile, outcome: ArchiveOutcome) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}-{:06}-{}.xml",
            feed.datasource,
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            seq,
            outcome
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, feed.xml.as_bytes()).await?;
        Ok(path)
    }
}
