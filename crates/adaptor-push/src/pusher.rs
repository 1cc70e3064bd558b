//! The push sink handed to repositories

use adaptor_core::{Acl, DocId, PushItem, Record};
use async_trait::async_trait;
use serde::Serialize;

use crate::retry::RetryPolicy;
use crate::PushError;

/// Progress of a push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub batches_sent: u64,
    pub items_sent: u64,
}

impl PushReport {
    pub fn merge(&mut self, other: PushReport) {
        self.batches_sent += other.batches_sent;
        self.items_sent += other.items_sent;
    }
}

/// Accepts push items and delivers them to the appliance in batches
///
/// Items are pulled lazily, one batch at a time, so `items` may be
/// unbounded. `policy` overrides the sender's default transmission policy.
#[async_trait]
pub trait DocIdPusher: Send + Sync {
    async fn push_items(
        &self,
        items: &mut (dyn Iterator<Item = PushItem> + Send),
        policy: Option<&dyn RetryPolicy>,
    ) -> Result<PushReport, PushError>;

    async fn push_doc_ids(&self, doc_ids: Vec<DocId>) -> Result<PushReport, PushError> {
        let mut items = doc_ids.into_iter().map(PushItem::from);
        self.push_items(&mut items, None).await
    }

    async fn push_records(&self, records: Vec<Record>) -> Result<PushReport, PushError> {
        let mut items = records.into_iter().map(PushItem::from);
        self.push_items(&mut items, None).await
    }

    /// Push ACLs that other documents inherit from
    async fn push_named_resources(&self, resources: Vec<(DocId, Acl)>) -> Result<PushReport, PushError> {
        let mut items = resources
            .into_iter()
            .map(|(doc_id, acl)| PushItem::named_resource(doc_id, acl));
        self.push_items(&mut items, None).await
    }
}
