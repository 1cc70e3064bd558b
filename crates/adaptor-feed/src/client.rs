//! Feed transmission
//!
//! One call sends one feed file to the appliance's `/xmlfeed` endpoint and
//! interprets the plain-text reply. Failures keep the stage they happened
//! in so retry policies can treat them differently.

use adaptor_core::AdaptorConfig;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Body, Client, StatusCode};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::maker::FeedFile;
use crate::multipart;
use crate::{FeedError, Result};

/// Reply token the appliance sends for an accepted feed
pub const SUCCESS_REPLY: &str = "Success";

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a feed was not accepted
#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("Failed to connect to feed endpoint: {0}")]
    FailedToConnect(#[source] BoxError),

    #[error("Failed writing feed request: {0}")]
    FailedWriting(#[source] BoxError),

    #[error("Failed reading feed reply: {0}")]
    FailedReadingReply(#[source] BoxError),

    /// The appliance answered, but not with `Success`
    #[error("Appliance rejected feed: {0:?}")]
    Rejected(String),
}

impl TransmitError {
    /// Network-level failure, as opposed to an application-level rejection
    pub fn is_transport(&self) -> bool {
        !matches!(self, TransmitError::Rejected(_))
    }
}

/// Sends rendered feeds to the appliance
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn send_feed(&self, feed: &FeedFile) -> std::result::Result<(), TransmitError>;
}

/// HTTP settings for [`FeedClient`]
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub feed_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub use_compression: bool,
    pub compression_min_bytes: usize,
    /// Larger bodies are sent uncompressed with a fixed length
    pub compression_max_bytes: usize,
}

impl FeedClientConfig {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(180),
            use_compression: false,
            compression_min_bytes: 0,
            compression_max_bytes: 1024 * 1024,
        }
    }

    pub fn from_config(config: &AdaptorConfig) -> Self {
        Self {
            feed_url: config.gsa.feed_url(),
            connect_timeout: config.gsa.connect_timeout(),
            read_timeout: config.gsa.read_timeout(),
            use_compression: config.feed.use_compression,
            compression_min_bytes: config.feed.compression_min_bytes,
            compression_max_bytes: config.feed.compression_max_bytes,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub fn with_compression(mut self, min_bytes: usize, max_bytes: usize) -> Self {
        self.use_compression = true;
        self.compression_min_bytes = min_bytes;
        self.compression_max_bytes = max_bytes;
        self
    }

    fn should_compress(&self, len: usize) -> bool {
        self.use_compression && len >= self.compression_min_bytes && len <= self.compression_max_bytes
    }
}

/// reqwest-backed [`FeedTransport`]
pub struct FeedClient {
    client: Client,
    config: FeedClientConfig,
}

impl FeedClient {
    pub fn new(config: FeedClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| FeedError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FeedClientConfig {
        &self.config
    }
}

#[async_trait]
impl FeedTransport for FeedClient {
    async fn send_feed(&self, feed: &FeedFile) -> std::result::Result<(), TransmitError> {
        let body = multipart::encode(feed);
        let body_len = body.len();

        let request = self
            .client
            .post(&self.config.feed_url)
            .header(CONTENT_TYPE, multipart::content_type());

        let request = if self.config.should_compress(body_len) {
            let compressed = gzip(&body).map_err(|e| TransmitError::FailedWriting(Box::new(e)))?;
            debug!(
                datasource = %feed.datasource,
                raw_bytes = body_len,
                compressed_bytes = compressed.len(),
                "Sending compressed feed"
            );
            let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = compressed
                .chunks(STREAM_CHUNK_SIZE)
                .map(|chunk| Ok(chunk.to_vec()))
                .collect();
            request
                .header(CONTENT_ENCODING, "gzip")
                .body(Body::wrap_stream(futures::stream::iter(chunks)))
        } else {
            debug!(datasource = %feed.datasource, bytes = body_len, "Sending feed");
            request.body(body)
        };

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();
        let reply = response
            .text()
            .await
            .map_err(|e| TransmitError::FailedReadingReply(Box::new(e)))?;

        if status != StatusCode::OK {
            warn!(url = %self.config.feed_url, status = %status, "Feed endpoint returned non-OK status");
            return Err(TransmitError::FailedReadingReply(
                format!("HTTP status {}: {}", status, reply.trim()).into(),
            ));
        }

        let reply = reply.trim();
        if reply == SUCCESS_REPLY {
            Ok(())
        } else {
            Err(TransmitError::Rejected(reply.to_string()))
        }
    }
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

// reqwest reports one error for the whole exchange; the hyper cause tells
// whether the request went out before the connection failed. A timeout after
// the connection is up is counted as a read failure.
fn classify_send_error(error: reqwest::Error) -> TransmitError {
    if error.is_connect() {
        return TransmitError::FailedToConnect(Box::new(error));
    }
    if error.is_timeout() {
        return TransmitError::FailedReadingReply(Box::new(error));
    }
    if error.is_body() {
        return TransmitError::FailedWriting(Box::new(error));
    }
    match hyper_cause(&error) {
        Some(cause) if cause.is_body_write_aborted() || cause.is_user() => {
            TransmitError::FailedWriting(Box::new(error))
        }
        Some(cause) if cause.is_parse() || cause.is_incomplete_message() || cause.is_closed() => {
            TransmitError::FailedReadingReply(Box::new(error))
        }
        _ => TransmitError::FailedWriting(Box::new(error)),
    }
}

fn hyper_cause<'a>(error: &'a (dyn std::error::Error + 'static)) -> Option<&'a hyper::Error> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(cause) = err.downcast_ref::<hyper::Error>() {
            return Some(cause);
        }
        source = err.source();
    }
    None
}
