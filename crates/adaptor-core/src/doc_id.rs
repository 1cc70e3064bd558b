//! Document identity
//!
//! A [`DocId`] names one document in the repository together with the
//! access summary the appliance uses when it later fetches the content.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the appliance should decide who may read a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPermissions {
    /// Anyone may read the document
    Public,
    /// Check each user with a HEAD request at serving time
    HeadRequest,
    /// Repository-defined permission descriptor
    Custom(String),
}

impl Default for ReadPermissions {
    fn default() -> Self {
        Self::HeadRequest
    }
}

/// What the appliance should do with the document it is told about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocAction {
    /// Add or update the document
    #[default]
    Add,
    /// Drop a previously indexed document
    Delete,
}

impl DocAction {
    /// Feed attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            DocAction::Add => "add",
            DocAction::Delete => "delete",
        }
    }
}

/// Immutable identifier of one repository document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId {
    unique_id: String,
    read_permissions: ReadPermissions,
    action: DocAction,
}

impl DocId {
    /// Document checked with a HEAD request when served
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self::with_permissions(unique_id, ReadPermissions::HeadRequest)
    }

    /// Document readable by everyone
    pub fn public(unique_id: impl Into<String>) -> Self {
        Self::with_permissions(unique_id, ReadPermissions::Public)
    }

    pub fn with_permissions(unique_id: impl Into<String>, read_permissions: ReadPermissions) -> Self {
        Self {
            unique_id: unique_id.into(),
            read_permissions,
            action: DocAction::Add,
        }
    }

    /// Delete marker. Always uses HEAD-request permissions.
    pub fn deleted(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            read_permissions: ReadPermissions::HeadRequest,
            action: DocAction::Delete,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn read_permissions(&self) -> &ReadPermissions {
        &self.read_permissions
    }

    pub fn action(&self) -> DocAction {
        self.action
    }

    pub fn is_deleted(&self) -> bool {
        self.action == DocAction::Delete
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.unique_id)
    }
}
