//! Full and incremental push runs

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::guard::OneAtATime;
use crate::journal::{Journal, PushKind, PushState};
use crate::pusher::PushReport;
use crate::repository::{Repository, RepositoryError};
use crate::retry::{ExponentialBackoff, Failure, RetryDecision, RetryPolicy};
use crate::sender::DocIdSender;
use crate::{PushError, Result};

/// Result of asking for a push to run in the caller's task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRun {
    Completed(PushReport),
    /// Another push of the same kind was in flight; nothing was done
    AlreadyRunning,
}

/// Result of asking for a push to run in the background
#[derive(Debug)]
pub enum PushStart {
    Started(JoinHandle<Result<PushReport>>),
    AlreadyRunning,
}

impl PushStart {
    pub fn is_started(&self) -> bool {
        matches!(self, PushStart::Started(_))
    }
}

pub struct PushService {
    repository: Arc<dyn Repository>,
    sender: DocIdSender,
    listing_policy: Arc<dyn RetryPolicy>,
    full_guard: OneAtATime,
    incremental_guard: OneAtATime,
    shutdown: CancellationToken,
}

impl PushService {
    pub fn new(repository: Arc<dyn Repository>, sender: DocIdSender) -> Self {
        Self {
            repository,
            sender,
            listing_policy: Arc::new(ExponentialBackoff::default()),
            full_guard: OneAtATime::new(),
            incremental_guard: OneAtATime::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Policy for failures raised by the repository while listing
    pub fn with_listing_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.listing_policy = policy;
        self
    }

    pub fn journal(&self) -> &Arc<Journal> {
        self.sender.journal()
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Parent token of every background push
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Interrupt background pushes
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self, kind: PushKind) -> bool {
        self.guard(kind).is_running()
    }

    fn guard(&self, kind: PushKind) -> &OneAtATime {
        match kind {
            PushKind::Full => &self.full_guard,
            PushKind::Incremental => &self.incremental_guard,
        }
    }

    pub async fn run_full_push(&self, cancel: CancellationToken) -> Result<PushRun> {
        self.run(PushKind::Full, cancel).await
    }

    pub async fn run_incremental_push(&self, cancel: CancellationToken) -> Result<PushRun> {
        self.run(PushKind::Incremental, cancel).await
    }

    pub fn start_full_push(self: &Arc<Self>) -> PushStart {
        self.start(PushKind::Full)
    }

    pub fn start_incremental_push(self: &Arc<Self>) -> PushStart {
        self.start(PushKind::Incremental)
    }

    async fn run(&self, kind: PushKind, cancel: CancellationToken) -> Result<PushRun> {
        let Some(_guard) = self.guard(kind).try_acquire() else {
            info!(kind = %kind, "Push already running, ignoring request");
            return Ok(PushRun::AlreadyRunning);
        };
        self.execute(kind, cancel).await.map(PushRun::Completed)
    }

    fn start(self: &Arc<Self>, kind: PushKind) -> PushStart {
        let Some(guard) = self.guard(kind).try_acquire() else {
            info!(kind = %kind, "Push already running, ignoring request");
            return PushStart::AlreadyRunning;
        };
        let service = Arc::clone(self);
        let cancel = self.shutdown.child_token();
        PushStart::Started(tokio::spawn(async move {
            let _guard = guard;
            service.execute(kind, cancel).await
        }))
    }

    async fn execute(&self, kind: PushKind, cancel: CancellationToken) -> Result<PushReport> {
        let journal = self.journal();
        journal.push_started(kind);
        info!(kind = %kind, "Push started");

        let sender = self.sender.for_push(kind, cancel.clone());
        let result = self.list_with_retry(kind, &sender, &cancel).await;

        match &result {
            Ok(report) => {
                journal.push_succeeded(kind);
                info!(
                    kind = %kind,
                    batches = report.batches_sent,
                    items = report.items_sent,
                    "Push succeeded"
                );
            }
            Err(PushError::Interrupted { progress }) => {
                journal.push_interrupted(kind);
                warn!(kind = %kind, batches = progress.batches_sent, "Push interrupted");
            }
            Err(e) => {
                journal.push_failed(kind, e.to_string());
                let progress = sender.progress();
                error!(
                    kind = %kind,
                    batches = progress.batches_sent,
                    items = progress.items_sent,
                    error = %e,
                    "Push failed"
                );
            }
        }
        result
    }

    async fn list_with_retry(
        &self,
        kind: PushKind,
        sender: &DocIdSender,
        cancel: &CancellationToken,
    ) -> Result<PushReport> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.journal().set_state(kind, PushState::Enumerating);

            let listing = async {
                match kind {
                    PushKind::Full => self.repository.get_doc_ids(sender).await,
                    PushKind::Incremental => self.repository.get_modified_doc_ids(sender).await,
                }
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PushError::Interrupted { progress: sender.progress() }),
                result = listing => result,
            };

            let error = match result {
                Ok(()) => return Ok(sender.progress()),
                // Feed failures already went through the transmission policy
                Err(RepositoryError::Push(push)) => return Err(*push),
                Err(error @ RepositoryError::Unsupported(_)) => {
                    return Err(PushError::Listing { attempts: attempt, source: error })
                }
                Err(error) => error,
            };

            match self.listing_policy.on_failure(&Failure::listing(&error), attempt) {
                RetryDecision::Retry { after } => {
                    warn!(
                        kind = %kind,
                        attempt,
                        delay_ms = after.as_millis() as u64,
                        error = %error,
                        "Repository listing failed, will retry"
                    );
                    self.journal().set_state(kind, PushState::Retrying);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(PushError::Interrupted { progress: sender.progress() }),
                        _ = tokio::time::sleep(after) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    return Err(PushError::Listing { attempts: attempt, source: error });
                }
            }
        }
    }
}
