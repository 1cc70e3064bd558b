//! Core value types for the document push pipeline
//!
//! - [`DocId`]: document identity with read permissions and add/delete action
//! - [`Acl`]: permit/deny principals with inheritance
//! - [`Record`]: a DocId plus the attributes sent with it
//! - [`PushItem`]: what a feed carries, a record or a named-resource ACL
//! - [`DocIdCodec`]: reversible DocId <-> URL mapping
//! - [`AdaptorConfig`]: configuration consumed by the feed and push crates

pub mod acl;
pub mod codec;
pub mod config;
pub mod doc_id;
pub mod push_item;
pub mod record;

pub use acl::{Acl, AclBuilder, AclError, InheritFrom, InheritanceType, Principal, PrincipalKind};
pub use codec::{CodecError, DocIdCodec};
pub use self::config::{
    AdaptorConfig, FeedConfig, GsaConfig, RetrySettings, ScheduleConfig, ServerConfig, ENV_PREFIX,
};
pub use doc_id::{DocAction, DocId, ReadPermissions};
pub use push_item::PushItem;
pub use record::{Metadata, Record, RecordBuilder};
