//! Content repository listing interface

use async_trait::async_trait;
use thiserror::Error;

use crate::pusher::DocIdPusher;
use crate::PushError;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Push(Box<PushError>),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Repository error: {0}")]
    Other(String),
}

impl From<PushError> for RepositoryError {
    fn from(error: PushError) -> Self {
        RepositoryError::Push(Box::new(error))
    }
}

/// Enumerates documents of a content repository into a [`DocIdPusher`]
///
/// Implementations should push in the order the appliance must process
/// documents, e.g. ACL inheritance parents before their children.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Push every document id
    async fn get_doc_ids(&self, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError>;

    /// Push ids of documents changed since the previous call
    async fn get_modified_doc_ids(&self, pusher: &dyn DocIdPusher) -> Result<(), RepositoryError> {
        let _ = pusher;
        Err(RepositoryError::Unsupported("incremental listing"))
    }

    fn supports_incremental(&self) -> bool {
        false
    }
}
