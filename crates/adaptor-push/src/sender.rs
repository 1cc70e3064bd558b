//! Batching sender
//!
//! Pulls push items in batches of at most `max_feed_size`, renders each
//! batch once and hands the rendered feed to a [`FeedTransport`]. A failed
//! batch is resent byte for byte until the retry policy gives up, at which
//! point the whole push is aborted. Later batches are never sent past a
//! batch that failed.

use adaptor_core::PushItem;
use adaptor_feed::{ArchiveOutcome, FeedArchiver, FeedFile, FeedFileMaker, FeedTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::journal::{Journal, PushKind, PushState};
use crate::pusher::{DocIdPusher, PushReport};
use crate::retry::{ExponentialBackoff, Failure, RetryDecision, RetryPolicy};
use crate::PushError;

pub const DEFAULT_MAX_FEED_SIZE: usize = 5000;

#[derive(Clone)]
pub struct DocIdSender {
    transport: Arc<dyn FeedTransport>,
    maker: Arc<FeedFileMaker>,
    journal: Arc<Journal>,
    max_feed_size: usize,
    policy: Arc<dyn RetryPolicy>,
    archiver: Option<Arc<FeedArchiver>>,
    kind: PushKind,
    cancel: CancellationToken,
    progress: Arc<Mutex<PushReport>>,
}

impl DocIdSender {
    pub fn new(transport: Arc<dyn FeedTransport>, maker: FeedFileMaker, journal: Arc<Journal>) -> Self {
        Self {
            transport,
            maker: Arc::new(maker),
            journal,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
            policy: Arc::new(ExponentialBackoff::default()),
            archiver: None,
            kind: PushKind::Full,
            cancel: CancellationToken::new(),
            progress: Arc::new(Mutex::new(PushReport::default())),
        }
    }

    /// Zero is treated as one
    pub fn with_max_feed_size(mut self, max_feed_size: usize) -> Self {
        self.max_feed_size = max_feed_size.max(1);
        self
    }

    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<FeedArchiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn with_kind(mut self, kind: PushKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A sender for a new push run, with its own progress counter
    pub fn for_push(&self, kind: PushKind, cancel: CancellationToken) -> Self {
        Self {
            kind,
            cancel,
            progress: Arc::new(Mutex::new(PushReport::default())),
            ..self.clone()
        }
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    pub fn kind(&self) -> PushKind {
        self.kind
    }

    pub fn max_feed_size(&self) -> usize {
        self.max_feed_size
    }

    /// Batches and items sent by this run so far, across all `push_items` calls
    pub fn progress(&self) -> PushReport {
        *self.progress.lock()
    }

    fn interrupted(&self) -> PushError {
        PushError::Interrupted {
            progress: self.progress(),
        }
    }

    async fn archive(&self, feed: &FeedFile, outcome: ArchiveOutcome) {
        if let Some(archiver) = &self.archiver {
            archiver.archive(feed, outcome).await;
        }
    }

    async fn send_batch(
        &self,
        feed: &FeedFile,
        batch: &[PushItem],
        batch_number: u64,
        policy: &dyn RetryPolicy,
    ) -> Result<(), PushError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.journal.set_state(self.kind, PushState::Sending);

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.interrupted()),
                result = self.transport.send_feed(feed) => result,
            };

            let error = match result {
                Ok(()) => {
                    debug!(
                        kind = %self.kind,
                        batch = batch_number,
                        items = batch.len(),
                        attempt,
                        "Feed accepted"
                    );
                    self.archive(feed, ArchiveOutcome::Success).await;
                    return Ok(());
                }
                Err(error) => error,
            };

            self.journal.transmission_failed(self.kind);
            let decision = policy.on_failure(&Failure::transmission(&error), attempt);
            match decision {
                RetryDecision::Retry { after } => {
                    warn!(
                        kind = %self.kind,
                        batch = batch_number,
                        attempt,
                        delay_ms = after.as_millis() as u64,
                        error = %error,
                        "Feed transmission failed, will retry"
                    );
                    self.journal.set_state(self.kind, PushState::Retrying);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(self.interrupted()),
                        _ = tokio::time::sleep(after) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    error!(
                        kind = %self.kind,
                        batch = batch_number,
                        attempts = attempt,
                        error = %error,
                        "Feed transmission failed, aborting push"
                    );
                    self.archive(feed, ArchiveOutcome::Failed).await;
                    // Batches are never empty
                    let first_unsent = batch[0].doc_id().clone();
                    return Err(PushError::Aborted {
                        progress: self.progress(),
                        batch: batch_number,
                        first_unsent,
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl DocIdPusher for DocIdSender {
    async fn push_items(
        &self,
        items: &mut (dyn Iterator<Item = PushItem> + Send),
        policy: Option<&dyn RetryPolicy>,
    ) -> Result<PushReport, PushError> {
        let policy = policy.unwrap_or(self.policy.as_ref());
        let mut report = PushReport::default();

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.interrupted());
            }

            self.journal.set_state(self.kind, PushState::Batching);
            let batch: Vec<PushItem> = (&mut *items).take(self.max_feed_size).collect();
            if batch.is_empty() {
                break;
            }

            let batch_number = self.progress().batches_sent + 1;
            let feed = self.maker.make_feed(&batch)?;
            self.send_batch(&feed, &batch, batch_number, policy).await?;

            report.batches_sent += 1;
            report.items_sent += batch.len() as u64;
            self.progress.lock().merge(PushReport {
                batches_sent: 1,
                items_sent: batch.len() as u64,
            });
            self.journal.batch_sent(self.kind, batch.len());
        }

        self.journal.set_state(self.kind, PushState::Enumerating);
        Ok(report)
    }
}
