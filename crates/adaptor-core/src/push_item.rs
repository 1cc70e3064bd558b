//! Items the push pipeline serializes into feeds

use crate::acl::Acl;
use crate::doc_id::DocId;
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// One entry of a feed: a document record or a standalone ACL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushItem {
    Record(Record),
    /// ACL pushed on its own so other ACLs can inherit from it
    NamedResource {
        doc_id: DocId,
        fragment: Option<String>,
        acl: Acl,
    },
}

impl PushItem {
    pub fn named_resource(doc_id: DocId, acl: Acl) -> Self {
        PushItem::NamedResource {
            doc_id,
            fragment: None,
            acl,
        }
    }

    pub fn named_fragment(doc_id: DocId, fragment: impl Into<String>, acl: Acl) -> Self {
        PushItem::NamedResource {
            doc_id,
            fragment: Some(fragment.into()),
            acl,
        }
    }

    pub fn doc_id(&self) -> &DocId {
        match self {
            PushItem::Record(record) => record.doc_id(),
            PushItem::NamedResource { doc_id, .. } => doc_id,
        }
    }
}

impl From<DocId> for PushItem {
    fn from(doc_id: DocId) -> Self {
        PushItem::Record(Record::from(doc_id))
    }
}

impl From<Record> for PushItem {
    fn from(record: Record) -> Self {
        PushItem::Record(record)
    }
}
