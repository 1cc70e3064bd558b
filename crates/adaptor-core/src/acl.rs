//! Access control lists
//!
//! An [`Acl`] is attached to a record or pushed on its own as a named
//! resource that other ACLs inherit from. Instances are built once through
//! [`AclBuilder`] and never change afterwards.

use crate::doc_id::DocId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace used when a principal does not name one
pub const DEFAULT_NAMESPACE: &str = "Default";

/// ACL construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("Principal name must not be empty")]
    EmptyPrincipalName,

    #[error("Principal name has leading or trailing whitespace: {0:?}")]
    UntrimmedPrincipalName(String),

    #[error("Inherit-from fragment must not be empty")]
    EmptyFragment,
}

/// User or group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        }
    }
}

/// A user or group named in an ACL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub name: String,
    pub namespace: String,
    pub domain: Option<String>,
}

impl Principal {
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(PrincipalKind::User, name)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Group, name)
    }

    fn new(kind: PrincipalKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            domain: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.kind == PrincipalKind::User
    }

    pub fn is_group(&self) -> bool {
        self.kind == PrincipalKind::Group
    }

    /// Name as the appliance sees it, `domain\name` when qualified
    pub fn qualified_name(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}\\{}", domain, self.name),
            None => self.name.clone(),
        }
    }

    fn validate(&self) -> Result<(), AclError> {
        if self.name.is_empty() {
            return Err(AclError::EmptyPrincipalName);
        }
        if self.name.trim() != self.name {
            return Err(AclError::UntrimmedPrincipalName(self.name.clone()));
        }
        Ok(())
    }
}

/// How an ACL combines with the ACL it inherits from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceType {
    /// Nothing inherits from this ACL
    #[default]
    LeafNode,
    /// The child's decision wins
    ChildOverrides,
    /// The parent's decision wins
    ParentOverrides,
    /// Both parent and child must permit
    AndBothPermit,
}

impl InheritanceType {
    /// Feed attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            InheritanceType::LeafNode => "leaf-node",
            InheritanceType::ChildOverrides => "child-overrides",
            InheritanceType::ParentOverrides => "parent-overrides",
            InheritanceType::AndBothPermit => "and-both-permit",
        }
    }
}

/// Parent of an ACL: a document, or a named resource under it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InheritFrom {
    pub doc_id: DocId,
    pub fragment: Option<String>,
}

/// Immutable access control list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    permits: Vec<Principal>,
    denies: Vec<Principal>,
    user_case_sensitive: bool,
    group_case_sensitive: bool,
    inheritance_type: InheritanceType,
    inherit_from: Option<InheritFrom>,
}

impl Acl {
    pub fn builder() -> AclBuilder {
        AclBuilder::default()
    }

    /// Permitted principals in insertion order
    pub fn permits(&self) -> &[Principal] {
        &self.permits
    }

    /// Denied principals in insertion order
    pub fn denies(&self) -> &[Principal] {
        &self.denies
    }

    pub fn permit_users(&self) -> impl Iterator<Item = &Principal> {
        self.permits.iter().filter(|p| p.is_user())
    }

    pub fn permit_groups(&self) -> impl Iterator<Item = &Principal> {
        self.permits.iter().filter(|p| p.is_group())
    }

    pub fn deny_users(&self) -> impl Iterator<Item = &Principal> {
        self.denies.iter().filter(|p| p.is_user())
    }

    pub fn deny_groups(&self) -> impl Iterator<Item = &Principal> {
        self.denies.iter().filter(|p| p.is_group())
    }

    pub fn is_user_case_sensitive(&self) -> bool {
        self.user_case_sensitive
    }

    pub fn is_group_case_sensitive(&self) -> bool {
        self.group_case_sensitive
    }

    /// Case sensitivity that applies to one principal
    pub fn is_case_sensitive_for(&self, principal: &Principal) -> bool {
        match principal.kind {
            PrincipalKind::User => self.user_case_sensitive,
            PrincipalKind::Group => self.group_case_sensitive,
        }
    }

    pub fn inheritance_type(&self) -> InheritanceType {
        self.inheritance_type
    }

    pub fn inherit_from(&self) -> Option<&InheritFrom> {
        self.inherit_from.as_ref()
    }
}

/// Builder for [`Acl`]
#[derive(Debug, Clone)]
pub struct AclBuilder {
    permits: Vec<Principal>,
    denies: Vec<Principal>,
    user_case_sensitive: bool,
    group_case_sensitive: bool,
    inheritance_type: InheritanceType,
    inherit_from: Option<InheritFrom>,
}

impl Default for AclBuilder {
    fn default() -> Self {
        Self {
            permits: Vec::new(),
            denies: Vec::new(),
            user_case_sensitive: true,
            group_case_sensitive: true,
            inheritance_type: InheritanceType::LeafNode,
            inherit_from: None,
        }
    }
}

impl AclBuilder {
    /// Start from an existing ACL
    pub fn from_acl(acl: &Acl) -> Self {
        Self {
            permits: acl.permits.clone(),
            denies: acl.denies.clone(),
            user_case_sensitive: acl.user_case_sensitive,
            group_case_sensitive: acl.group_case_sensitive,
            inheritance_type: acl.inheritance_type,
            inherit_from: acl.inherit_from.clone(),
        }
    }

    pub fn set_permits(mut self, principals: impl IntoIterator<Item = Principal>) -> Self {
        self.permits = principals.into_iter().collect();
        self
    }

    pub fn set_denies(mut self, principals: impl IntoIterator<Item = Principal>) -> Self {
        self.denies = principals.into_iter().collect();
        self
    }

    /// Replace permitted users, keeping permitted groups
    pub fn set_permit_users<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        replace_kind(&mut self.permits, PrincipalKind::User, names);
        self
    }

    /// Replace permitted groups, keeping permitted users
    pub fn set_permit_groups<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        replace_kind(&mut self.permits, PrincipalKind::Group, names);
        self
    }

    pub fn set_deny_users<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        replace_kind(&mut self.denies, PrincipalKind::User, names);
        self
    }

    pub fn set_deny_groups<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        replace_kind(&mut self.denies, PrincipalKind::Group, names);
        self
    }

    pub fn set_user_case_sensitive(mut self, sensitive: bool) -> Self {
        self.user_case_sensitive = sensitive;
        self
    }

    pub fn set_group_case_sensitive(mut self, sensitive: bool) -> Self {
        self.group_case_sensitive = sensitive;
        self
    }

    pub fn set_everything_case_insensitive(self) -> Self {
        self.set_user_case_sensitive(false).set_group_case_sensitive(false)
    }

    pub fn set_everything_case_sensitive(self) -> Self {
        self.set_user_case_sensitive(true).set_group_case_sensitive(true)
    }

    pub fn set_inheritance_type(mut self, inheritance_type: InheritanceType) -> Self {
        self.inheritance_type = inheritance_type;
        self
    }

    pub fn set_inherit_from(mut self, doc_id: DocId) -> Self {
        self.inherit_from = Some(InheritFrom {
            doc_id,
            fragment: None,
        });
        self
    }

    /// Inherit from the named resource `fragment` under `doc_id`
    pub fn set_inherit_from_fragment(mut self, doc_id: DocId, fragment: impl Into<String>) -> Self {
        self.inherit_from = Some(InheritFrom {
            doc_id,
            fragment: Some(fragment.into()),
        });
        self
    }

    pub fn clear_inherit_from(mut self) -> Self {
        self.inherit_from = None;
        self
    }

    pub fn build(self) -> Result<Acl, AclError> {
        for principal in self.permits.iter().chain(self.denies.iter()) {
            principal.validate()?;
        }
        if let Some(InheritFrom {
            fragment: Some(fragment),
            ..
        }) = &self.inherit_from
        {
            if fragment.is_empty() {
                return Err(AclError::EmptyFragment);
            }
        }

        Ok(Acl {
            permits: dedup(self.permits),
            denies: dedup(self.denies),
            user_case_sensitive: self.user_case_sensitive,
            group_case_sensitive: self.group_case_sensitive,
            inheritance_type: self.inheritance_type,
            inherit_from: self.inherit_from,
        })
    }
}

fn replace_kind<S: Into<String>>(
    principals: &mut Vec<Principal>,
    kind: PrincipalKind,
    names: impl IntoIterator<Item = S>,
) {
    principals.retain(|p| p.kind != kind);
    principals.extend(names.into_iter().map(|name| Principal::new(kind, name)));
}

// Keeps the first occurrence so rendering order stays stable.
fn dedup(principals: Vec<Principal>) -> Vec<Principal> {
    let mut out: Vec<Principal> = Vec::with_capacity(principals.len());
    for principal in principals {
        if !out.contains(&principal) {
            out.push(principal);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let acl = Acl::builder().build().unwrap();
        assert!(acl.permits().is_empty());
        assert!(acl.denies().is_empty());
        assert!(acl.is_user_case_sensitive());
        assert!(acl.is_group_case_sensitive());
        assert_eq!(acl.inheritance_type(), InheritanceType::LeafNode);
        assert!(acl.inherit_from().is_none());
    }

    #[test]
    fn test_permit_and_deny_sets() {
        let acl = Acl::builder()
            .set_permit_users(["alice", "bob"])
            .set_permit_groups(["eng"])
            .set_deny_users(["mallory"])
            .build()
            .unwrap();

        let users: Vec<_> = acl.permit_users().map(|p| p.name.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob"]);
        assert_eq!(acl.permit_groups().count(), 1);
        assert_eq!(acl.deny_users().next().unwrap().name, "mallory");
        assert_eq!(acl.deny_groups().count(), 0);
    }

    #[test]
    fn test_setting_users_keeps_groups() {
        let acl = Acl::builder()
            .set_permit_groups(["eng"])
            .set_permit_users(["alice"])
            .set_permit_users(["carol"])
            .build()
            .unwrap();

        assert_eq!(acl.permits().len(), 2);
        assert_eq!(acl.permit_users().next().unwrap().name, "carol");
    }

    #[test]
    fn test_duplicates_dropped_in_order() {
        let acl = Acl::builder()
            .set_permits([
                Principal::user("b"),
                Principal::user("a"),
                Principal::user("b"),
            ])
            .build()
            .unwrap();

        let names: Vec<_> = acl.permits().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_everything_case_insensitive() {
        let acl = Acl::builder()
            .set_everything_case_insensitive()
            .build()
            .unwrap();
        assert!(!acl.is_user_case_sensitive());
        assert!(!acl.is_group_case_sensitive());
    }

    #[test]
    fn test_case_sensitivity_per_kind() {
        let acl = Acl::builder()
            .set_group_case_sensitive(false)
            .build()
            .unwrap();
        assert!(acl.is_case_sensitive_for(&Principal::user("u")));
        assert!(!acl.is_case_sensitive_for(&Principal::group("g")));
    }

    #[test]
    fn test_inherit_from_overloads() {
        let parent = DocId::new("share");
        let plain = Acl::builder()
            .set_inherit_from(parent.clone())
            .set_inheritance_type(InheritanceType::ChildOverrides)
            .build()
            .unwrap();
        let inherit = plain.inherit_from().unwrap();
        assert_eq!(inherit.doc_id, parent);
        assert!(inherit.fragment.is_none());

        let fragment = Acl::builder()
            .set_inherit_from_fragment(parent.clone(), "shareAcl")
            .build()
            .unwrap();
        assert_eq!(
            fragment.inherit_from().unwrap().fragment.as_deref(),
            Some("shareAcl")
        );
    }

    #[test]
    fn test_clear_inherit_from() {
        let inherited = Acl::builder()
            .set_inherit_from_fragment(DocId::new("share"), "shareAcl")
            .set_permit_users(["alice"])
            .build()
            .unwrap();
        assert!(inherited.inherit_from().is_some());

        let cleared = AclBuilder::from_acl(&inherited)
            .clear_inherit_from()
            .build()
            .unwrap();
        assert!(cleared.inherit_from().is_none());
        assert_eq!(cleared.permits(), inherited.permits());
    }

    #[test]
    fn test_rejects_bad_principal_names() {
        let err = Acl::builder()
            .set_permits([Principal::user("")])
            .build()
            .unwrap_err();
        assert_eq!(err, AclError::EmptyPrincipalName);

        let err = Acl::builder()
            .set_denies([Principal::group(" eng")])
            .build()
            .unwrap_err();
        assert!(matches!(err, AclError::UntrimmedPrincipalName(_)));
    }

    #[test]
    fn test_rejects_empty_fragment() {
        let err = Acl::builder()
            .set_inherit_from_fragment(DocId::new("p"), "")
            .build()
            .unwrap_err();
        assert_eq!(err, AclError::EmptyFragment);
    }

    #[test]
    fn test_qualified_name() {
        let p = Principal::user("alice").with_domain("CORP").in_namespace("ns1");
        assert_eq!(p.qualified_name(), "CORP\\alice");
        assert_eq!(p.namespace, "ns1");
        assert_eq!(Principal::group("eng").qualified_name(), "eng");
    }

    #[test]
    fn test_from_acl_round_trip() {
        let acl = Acl::builder()
            .set_permit_users(["alice"])
            .set_inheritance_type(InheritanceType::AndBothPermit)
            .build()
            .unwrap();
        let copy = AclBuilder::from_acl(&acl).build().unwrap();
        assert_eq!(acl, copy);
    }
}
