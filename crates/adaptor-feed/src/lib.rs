//! Feed rendering and transmission for the adaptor
//!
//! This crate turns batches of push items into `gsafeed` XML documents and
//! delivers them to the appliance's feed endpoint:
//! - [`FeedFileMaker`] renders a batch into a deterministic [`FeedFile`]
//! - [`multipart`] frames a feed as a `multipart/form-data` body
//! - [`FeedClient`] posts it over HTTP and interprets the reply
//! - [`FeedArchiver`] optionally keeps a copy of each feed on disk

pub mod archive;
pub mod client;
pub mod maker;
pub mod multipart;

pub use archive::{ArchiveOutcome, FeedArchiver};
pub use client::{BoxError, FeedClient, FeedClientConfig, FeedTransport, TransmitError, SUCCESS_REPLY};
pub use maker::{validate_datasource, FeedFile, FeedFileMaker, FeedSettings, FeedType};

use adaptor_core::CodecError;
use thiserror::Error;

/// Errors raised while building feeds or the feed client
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Invalid datasource name {0:?}: must match [a-zA-Z_][a-zA-Z0-9_-]*")]
    InvalidDatasource(String),

    #[error("Unknown feed type: {0}")]
    InvalidFeedType(String),

    #[error("Cannot render item {doc_id}: {source}")]
    InvalidItem {
        doc_id: String,
        #[source]
        source: CodecError,
    },

    #[error("XML writer error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
