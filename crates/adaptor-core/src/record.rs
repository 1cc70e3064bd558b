//! Push-time document records

use crate::acl::Acl;
use crate::doc_id::{DocAction, DocId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Multi-valued name/value pairs, iterated by name then value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    entries: BTreeSet<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    /// Remove every value for `name`
    pub fn remove_all(&mut self, name: &str) {
        self.entries.retain(|(key, _)| key != name);
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.add(k, v);
        }
        metadata
    }
}

/// A DocId plus the attributes sent with it in a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    doc_id: DocId,
    crawl_immediately: bool,
    crawl_once: bool,
    lock: bool,
    last_modified: Option<DateTime<Utc>>,
    delete_from_index: bool,
    result_link: Option<String>,
    metadata: Option<Metadata>,
    acl: Option<Acl>,
}

impl Record {
    pub fn builder(doc_id: DocId) -> RecordBuilder {
        RecordBuilder::new(doc_id)
    }

    pub fn doc_id(&self) -> &DocId {
        &self.doc_id
    }

    pub fn crawl_immediately(&self) -> bool {
        self.crawl_immediately
    }

    pub fn crawl_once(&self) -> bool {
        self.crawl_once
    }

    pub fn lock(&self) -> bool {
        self.lock
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn delete_from_index(&self) -> bool {
        self.delete_from_index
    }

    pub fn result_link(&self) -> Option<&str> {
        self.result_link.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn acl(&self) -> Option<&Acl> {
        self.acl.as_ref()
    }

    /// Delete when either the DocId is a delete marker or the record asks for it
    pub fn action(&self) -> DocAction {
        if self.delete_from_index || self.doc_id.is_deleted() {
            DocAction::Delete
        } else {
            DocAction::Add
        }
    }
}

impl From<DocId> for Record {
    fn from(doc_id: DocId) -> Self {
        Record::builder(doc_id).build()
    }
}

/// Builder for [`Record`]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(doc_id: DocId) -> Self {
        Self {
            record: Record {
                doc_id,
                crawl_immediately: false,
                crawl_once: false,
                lock: false,
                last_modified: None,
                delete_from_index: false,
                result_link: None,
                metadata: None,
                acl: None,
            },
        }
    }

    /// Start from an existing record
    pub fn from_record(record: &Record) -> Self {
        Self {
            record: record.clone(),
        }
    }

    pub fn set_doc_id(mut self, doc_id: DocId) -> Self {
        self.record.doc_id = doc_id;
        self
    }

    pub fn set_crawl_immediately(mut self, crawl_immediately: bool) -> Self {
        self.record.crawl_immediately = crawl_immediately;
        self
    }

    pub fn set_crawl_once(mut self, crawl_once: bool) -> Self {
        self.record.crawl_once = crawl_once;
        self
    }

    pub fn set_lock(mut self, lock: bool) -> Self {
        self.record.lock = lock;
        self
    }

    pub fn set_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.record.last_modified = Some(last_modified);
        self
    }

    pub fn set_delete_from_index(mut self, delete: bool) -> Self {
        self.record.delete_from_index = delete;
        self
    }

    pub fn set_result_link(mut self, link: impl Into<String>) -> Self {
        self.record.result_link = Some(link.into());
        self
    }

    pub fn set_metadata(mut self, metadata: Metadata) -> Self {
        self.record.metadata = Some(metadata);
        self
    }

    pub fn set_acl(mut self, acl: Acl) -> Self {
        self.record.acl = Some(acl);
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}
