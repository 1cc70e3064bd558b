//! Document-id push pipeline
//!
//! Drives full and incremental pushes: a [`Repository`] enumerates documents
//! into a [`DocIdPusher`], the [`DocIdSender`] batches them into feeds and
//! delivers them with retry, and the [`Journal`] records what happened.
//! [`PushService`] adds listing retries and the one-at-a-time guard, and
//! [`PushScheduler`] runs both kinds of push on a timer.

pub mod guard;
pub mod journal;
pub mod pusher;
pub mod repository;
pub mod retry;
pub mod scheduler;
pub mod sender;
pub mod service;

pub use guard::{OneAtATime, RunGuard};
pub use journal::{Journal, JournalSnapshot, PushKind, PushOutcome, PushState, PushStatus};
pub use pusher::{DocIdPusher, PushReport};
pub use repository::{Repository, RepositoryError};
pub use retry::{ExponentialBackoff, Failure, FailureClass, NoRetry, RetryDecision, RetryPolicy};
pub use scheduler::PushScheduler;
pub use sender::{DocIdSender, DEFAULT_MAX_FEED_SIZE};
pub use service::{PushService, PushStart, PushRun};

use adaptor_core::DocId;
use adaptor_feed::{FeedError, TransmitError};
use thiserror::Error;

/// Why a push did not complete
#[derive(Error, Debug)]
pub enum PushError {
    /// The retry policy gave up on a batch; nothing after it was sent
    #[error("Push aborted at batch {batch} (first unsent {first_unsent}) after {attempts} attempt(s): {source}")]
    Aborted {
        progress: PushReport,
        batch: u64,
        first_unsent: DocId,
        attempts: u32,
        #[source]
        source: TransmitError,
    },

    #[error("Push interrupted after {} batch(es)", .progress.batches_sent)]
    Interrupted { progress: PushReport },

    #[error("Invalid push item: {0}")]
    InvalidItem(#[from] FeedError),

    #[error("Repository listing failed after {attempts} attempt(s): {source}")]
    Listing {
        attempts: u32,
        #[source]
        source: RepositoryError,
    },
}

impl PushError {
    /// Work completed before the failure, when known
    pub fn progress(&self) -> Option<PushReport> {
        match self {
            PushError::Aborted { progress, .. } | PushError::Interrupted { progress } => Some(*progress),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, PushError::Interrupted { .. })
    }
}

pub type Result<T> = std::result::Result<T, PushError>;
