//! Repository backed by plain-text listing files
//!
//! One document id per line. Blank lines and lines starting with `#` are
//! skipped. An id may be followed by a tab and one flag:
//! `public`, `delete`, or `auth=<method>` for a custom auth method.

use adaptor_core::{DocId, ReadPermissions};
use adaptor_push::{DocIdPusher, Repository, RepositoryError, DEFAULT_MAX_FEED_SIZE};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

pub struct FileListing {
    listing: PathBuf,
    modified: Option<PathBuf>,
    chunk_size: usize,
}

impl FileListing {
    pub fn new(listing: impl Into<PathBuf>) -> Self {
        Self {
            listing: listing.into(),
            modified: None,
            chunk_size: DEFAULT_MAX_FEED_SIZE,
        }
    }

    pub fn with_modified(mut self, modified: Option<PathBuf>) -> Self {
        self.modified = modified;
        self
    }

    /// Ids handed to the pusher per call; match the feed size to keep feeds full
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn push_file(&self, path: &Path, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError> {
        let mut reader = ListingReader::open(path).await?;
        let mut total = 0;
        loop {
            let chunk = reader.next_chunk(self.chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            total += chunk.len();
            pusher.push_doc_ids(chunk).await?;
        }
        debug!(path = %path.display(), count = total, "Pushed listing");
        Ok(())
    }
}

/// Streams document ids out of a listing file
pub struct ListingReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl ListingReader {
    pub async fn open(path: &Path) -> Result<Self, RepositoryError> {
        let file = File::open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// Up to `max` ids; empty once the file is exhausted
    pub async fn next_chunk(&mut self, max: usize) -> Result<Vec<DocId>, RepositoryError> {
        let max = max.max(1);
        let mut chunk = Vec::new();
        while chunk.len() < max {
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            self.line_number += 1;
            match parse_line(&line) {
                Ok(Some(doc_id)) => chunk.push(doc_id),
                Ok(None) => {}
                Err(reason) => warn!(
                    path = %self.path.display(),
                    line = self.line_number,
                    reason = %reason,
                    "Skipping listing line"
                ),
            }
        }
        Ok(chunk)
    }
}

/// `Ok(None)` for lines that carry no id
pub fn parse_line(line: &str) -> Result<Option<DocId>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (id, flag) = match line.split_once('\t') {
        Some((id, flag)) => (id, Some(flag.trim())),
        None => (line, None),
    };

    let doc_id = match flag {
        None | Some("") => DocId::new(id),
        Some("public") => DocId::public(id),
        Some("delete") => DocId::deleted(id),
        Some(flag) => match flag.strip_prefix("auth=") {
            Some(method) if !method.is_empty() => {
                DocId::with_permissions(id, ReadPermissions::Custom(method.to_string()))
            }
            _ => return Err(format!("unknown flag {:?}", flag)),
        },
    };
    Ok(Some(doc_id))
}

#[async_trait]
impl Repository for FileListing {
    async fn get_doc_ids(&self, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError> {
        self.push_file(&self.listing, pusher).await
    }

    async fn get_modified_doc_ids(&self, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError> {
        match &self.modified {
            Some(path) => self.push_file(path, pusher).await,
            None => Err(RepositoryError::Unsupported("incremental listing")),
        }
    }

    fn supports_incremental(&self) -> bool {
        self.modified.is_some()
    }
}
