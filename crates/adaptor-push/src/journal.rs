//! Push journal
//!
//! Shared, thread-safe record of push activity. Totals are atomics; the
//! per-kind status sits behind a `parking_lot` lock.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which listing a push enumerates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    Full,
    Incremental,
}

impl fmt::Display for PushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushKind::Full => write!(f, "full"),
            PushKind::Incremental => write!(f, "incremental"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushState {
    #[default]
    Idle,
    Enumerating,
    Batching,
    Sending,
    Retrying,
    Succeeded,
    Aborted,
    Interrupted,
}

impl PushState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            PushState::Enumerating | PushState::Batching | PushState::Sending | PushState::Retrying
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Succeeded,
    Failed,
    Interrupted,
}

/// Status of one push kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushStatus {
    pub state: PushState,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_interrupted: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<PushOutcome>,
    pub last_error: Option<String>,
    /// Batches sent by the current (or most recent) run
    pub batches_sent: u64,
    /// Items sent by the current (or most recent) run
    pub items_sent: u64,
}

/// Point-in-time copy of the journal
#[derive(Debug, Clone, Serialize)]
pub struct JournalSnapshot {
    pub total_batches_sent: u64,
    pub total_items_sent: u64,
    pub total_failed_transmissions: u64,
    pub full: PushStatus,
    pub incremental: PushStatus,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Journal {
    total_batches_sent: AtomicU64,
    total_items_sent: AtomicU64,
    total_failed_transmissions: AtomicU64,
    full: RwLock<PushStatus>,
    incremental: RwLock<PushStatus>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn status(&self, kind: PushKind) -> &RwLock<PushStatus> {
        match kind {
            PushKind::Full => &self.full,
            PushKind::Incremental => &self.incremental,
        }
    }

    pub fn push_started(&self, kind: PushKind) {
        let mut status = self.status(kind).write();
        status.state = PushState::Enumerating;
        status.runs_started += 1;
        status.last_started_at = Some(Utc::now());
        status.batches_sent = 0;
        status.items_sent = 0;
    }

    pub fn set_state(&self, kind: PushKind, state: PushState) {
        self.status(kind).write().state = state;
    }

    pub fn state(&self, kind: PushKind) -> PushState {
        self.status(kind).read().state
    }

    pub fn batch_sent(&self, kind: PushKind, items: usize) {
        self.total_batches_sent.fetch_add(1, Ordering::Relaxed);
        self.total_items_sent.fetch_add(items as u64, Ordering::Relaxed);

        let mut status = self.status(kind).write();
        status.batches_sent += 1;
        status.items_sent += items as u64;
    }

    pub fn transmission_failed(&self, _kind: PushKind) {
        self.total_failed_transmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn push_succeeded(&self, kind: PushKind) {
        self.finish(kind, PushState::Succeeded, PushOutcome::Succeeded, None);
    }

    pub fn push_failed(&self, kind: PushKind, error: impl Into<String>) {
        self.finish(kind, PushState::Aborted, PushOutcome::Failed, Some(error.into()));
    }

    pub fn push_interrupted(&self, kind: PushKind) {
        self.finish(kind, PushState::Interrupted, PushOutcome::Interrupted, None);
    }

    fn finish(&self, kind: PushKind, state: PushState, outcome: PushOutcome, error: Option<String>) {
        let mut status = self.status(kind).write();
        status.state = state;
        match outcome {
            PushOutcome::Succeeded => status.runs_succeeded += 1,
            PushOutcome::Failed => status.runs_failed += 1,
            PushOutcome::Interrupted => status.runs_interrupted += 1,
        }
        status.last_finished_at = Some(Utc::now());
        status.last_outcome = Some(outcome);
        status.last_error = error;
    }

    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            total_batches_sent: self.total_batches_sent.load(Ordering::Relaxed),
            total_items_sent: self.total_items_sent.load(Ordering::Relaxed),
            total_failed_transmissions: self.total_failed_transmissions.load(Ordering::Relaxed),
            full: self.full.read().clone(),
            incremental: self.incremental.read().clone(),
            taken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_run_lifecycle() {
        let journal = Journal::new();
        journal.push_started(PushKind::Full);
        assert_eq!(journal.state(PushKind::Full), PushState::Enumerating);
        assert!(journal.state(PushKind::Full).is_running());

        journal.batch_sent(PushKind::Full, 2);
        journal.batch_sent(PushKind::Full, 1);
        journal.push_succeeded(PushKind::Full);

        let snapshot = journal.snapshot();
        assert_eq!(snapshot.total_batches_sent, 2);
        assert_eq!(snapshot.total_items_sent, 3);
        assert_eq!(snapshot.full.state, PushState::Succeeded);
        assert_eq!(snapshot.full.runs_succeeded, 1);
        assert_eq!(snapshot.full.last_outcome, Some(PushOutcome::Succeeded));
        assert_eq!(snapshot.incremental.runs_started, 0);
    }

    #[test]
    fn test_new_run_resets_per_run_counts() {
        let journal = Journal::new();
        journal.push_started(PushKind::Incremental);
        journal.batch_sent(PushKind::Incremental, 5);
        journal.push_failed(PushKind::Incremental, "boom");

        journal.push_started(PushKind::Incremental);
        let status = journal.snapshot().incremental;
        assert_eq!(status.items_sent, 0);
        assert_eq!(status.runs_started, 2);
        assert_eq!(status.runs_failed, 1);
        assert_eq!(status.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_interrupted_is_not_failed() {
        let journal = Journal::new();
        journal.push_started(PushKind::Full);
        journal.push_interrupted(PushKind::Full);

        let status = journal.snapshot().full;
        assert_eq!(status.runs_interrupted, 1);
        assert_eq!(status.runs_failed, 0);
        assert_eq!(status.state, PushState::Interrupted);
    }

    #[test]
    fn test_concurrent_updates() {
        let journal = Arc::new(Journal::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let journal = journal.clone();
                std::thread::spawn(move || {
                    let kind = if i % 2 == 0 { PushKind::Full } else { PushKind::Incremental };
                    for _ in 0..100 {
                        journal.batch_sent(kind, 3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = journal.snapshot();
        assert_eq!(snapshot.total_batches_sent, 800);
        assert_eq!(snapshot.total_items_sent, 2400);
        assert_eq!(snapshot.full.batches_sent + snapshot.incremental.batches_sent, 800);
    }

    #[test]
    fn test_snapshot_serializes() {
        let journal = Journal::new();
        journal.push_started(PushKind::Full);
        let json = serde_json::to_value(journal.snapshot()).unwrap();
        assert_eq!(json["full"]["state"], "enumerating");
        assert_eq!(json["total_batches_sent"], 0);
    }
}
