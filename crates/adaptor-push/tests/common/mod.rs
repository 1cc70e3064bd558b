#![allow(dead_code)]

use adaptor_core::{DocId, DocIdCodec};
use adaptor_feed::{FeedFile, FeedFileMaker, FeedSettings, FeedTransport, TransmitError};
use adaptor_push::{
    DocIdPusher, DocIdSender, ExponentialBackoff, Journal, Repository, RepositoryError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const BASE_URL: &str = "http://localhost/doc/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Success,
    Connect,
    Write,
    Read,
    Reject,
}

impl Reply {
    fn into_result(self) -> Result<(), TransmitError> {
        let io = |msg: &str| Box::new(std::io::Error::other(msg.to_string()));
        match self {
            Reply::Success => Ok(()),
            Reply::Connect => Err(TransmitError::FailedToConnect(io("connection refused"))),
            Reply::Write => Err(TransmitError::FailedWriting(io("broken pipe"))),
            Reply::Read => Err(TransmitError::FailedReadingReply(io("reset by peer"))),
            Reply::Reject => Err(TransmitError::Rejected("Error - Unauthorized Request".to_string())),
        }
    }
}

/// Replies from a script, then with `fallback` forever
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    sent: Mutex<Vec<FeedFile>>,
}

impl ScriptedTransport {
    pub fn scripted(script: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::scripted(Vec::new(), Reply::Success)
    }

    pub fn failing(reply: Reply) -> Arc<Self> {
        Self::scripted(Vec::new(), reply)
    }

    pub fn sent(&self) -> Vec<FeedFile> {
        self.sent.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn send_feed(&self, feed: &FeedFile) -> Result<(), TransmitError> {
        self.sent.lock().push(feed.clone());
        let reply = self.script.lock().pop_front().unwrap_or(self.fallback);
        reply.into_result()
    }
}

/// Never answers
pub struct HangingTransport;

#[async_trait]
impl FeedTransport for HangingTransport {
    async fn send_feed(&self, _feed: &FeedFile) -> Result<(), TransmitError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub fn maker() -> FeedFileMaker {
    FeedFileMaker::new(
        DocIdCodec::new(BASE_URL, false).unwrap(),
        "testsource",
        FeedSettings::default(),
    )
    .unwrap()
}

pub fn sender(transport: Arc<dyn FeedTransport>, max_feed_size: usize) -> DocIdSender {
    DocIdSender::new(transport, maker(), Arc::new(Journal::new()))
        .with_max_feed_size(max_feed_size)
        .with_retry_policy(Arc::new(ExponentialBackoff::fixed(3, Duration::from_secs(1))))
}

pub fn doc_ids(ids: &[&str]) -> Vec<DocId> {
    ids.iter().map(|id| DocId::new(*id)).collect()
}

pub fn numbered(n: usize) -> Vec<DocId> {
    (0..n).map(|i| DocId::new(format!("doc{}", i))).collect()
}

/// Record URLs in feed order
pub fn record_urls(feed: &FeedFile) -> Vec<String> {
    feed.xml
        .split("<record url=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(str::to_string)
        .collect()
}

pub fn url_of(id: &str) -> String {
    format!("{}{}", BASE_URL, id)
}

/// Repository over a fixed list, with optional listing failures and a gate
#[derive(Default)]
pub struct TestRepository {
    pub doc_ids: Vec<DocId>,
    pub modified: Option<Vec<DocId>>,
    pub fail_first: u32,
    pub always_fail: bool,
    /// Listing blocks until this token is cancelled
    pub gate: Option<CancellationToken>,
    pub calls: AtomicU32,
    pub incremental_calls: AtomicU32,
}

impl TestRepository {
    pub fn new(doc_ids: Vec<DocId>) -> Self {
        Self {
            doc_ids,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn incremental_calls(&self) -> u32 {
        self.incremental_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for TestRepository {
    async fn get_doc_ids(&self, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.cancelled().await;
        }
        if self.always_fail || call <= self.fail_first {
            return Err(RepositoryError::Other(format!("listing failed on call {}", call)));
        }
        pusher.push_doc_ids(self.doc_ids.clone()).await?;
        Ok(())
    }

    async fn get_modified_doc_ids(&self, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError> {
        let Some(modified) = &self.modified else {
            return Err(RepositoryError::Unsupported("incremental listing"));
        };
        self.incremental_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.cancelled().await;
        }
        pusher.push_doc_ids(modified.clone()).await?;
        Ok(())
    }

    fn supports_incremental(&self) -> bool {
        self.modified.is_some()
    }
}
