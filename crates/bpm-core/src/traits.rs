//! Capability traits for resource families and their storage.
//!
//! A resource family declares its rules through [`Resource`] (and
//! [`Mutable`] when it supports update/delete). Storage backends implement
//! [`TxSource`]/[`EntityTx`] for the write path and [`EntityQuery`] for the
//! read path. The validation core in [`crate::validation`] is written once
//! against these traits.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::OrgScope;
use crate::models::{
    Audit, AuditStamp, Element, Meeting, Node, Team, Template, Upload,
};
use crate::pagination::{Page, PageRequest};

// =============================================================================
// SCOPING VOCABULARY
// =============================================================================

/// Parent entity kinds a record can hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKind {
    Template,
    Node,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentKind::Template => "template",
            ParentKind::Node => "node",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentRef {
    pub kind: ParentKind,
    pub id: i64,
}

impl ParentRef {
    pub fn template(id: i64) -> Self {
        Self {
            kind: ParentKind::Template,
            id,
        }
    }

    pub fn node(id: i64) -> Self {
        Self {
            kind: ParentKind::Node,
            id,
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

/// Where a record lives for tenant-scoping and uniqueness purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Directly owned by an organization.
    Organization(i64),
    /// Scoped through a parent chain that ends at an organization.
    Parent(ParentRef),
}

/// Value of a unique-scope key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Text(String),
    Int(i64),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Text(s) => write!(f, "'{}'", s),
            KeyValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// A natural key that must be unique among active records within `within`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    /// Column/field name of the key.
    pub field: &'static str,
    pub value: KeyValue,
    pub within: Placement,
}

impl UniqueKey {
    pub fn text(field: &'static str, value: &str, within: Placement) -> Self {
        Self {
            field,
            value: KeyValue::Text(value.to_string()),
            within,
        }
    }

    pub fn int(field: &'static str, value: i64, within: Placement) -> Self {
        Self {
            field,
            value: KeyValue::Int(value),
            within,
        }
    }
}

/// Ordering of list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// `id DESC`
    NewestFirst,
    /// `sort ASC, id ASC`
    BySort,
}

// =============================================================================
// RESOURCE RULES
// =============================================================================

/// Rules of one resource family.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Create payload.
    type New: Send + Sync;
    /// List filter.
    type Filter: ListFilter + Send + Sync;

    /// Singular lower-case name used in messages and logs.
    const KIND: &'static str;
    /// Whether update/delete are restricted to the creator.
    const OWNER_GATED: bool = false;
    const LIST_ORDER: ListOrder = ListOrder::NewestFirst;

    fn id(&self) -> i64;
    fn status(&self) -> i32;
    fn audit(&self) -> &Audit;
    fn audit_mut(&mut self) -> &mut Audit;
    fn placement(&self) -> Placement;
    fn unique_keys(&self) -> Vec<UniqueKey>;

    /// Creator identity for ownership-gated families.
    fn owner_id(&self) -> Option<i64> {
        None
    }

    /// Sort position for [`ListOrder::BySort`] families.
    fn sort(&self) -> i32 {
        0
    }

    /// Shape validation, run before any transaction is opened.
    fn validate_new(new: &Self::New) -> Result<()>;
    fn placement_of_new(new: &Self::New) -> Placement;
    fn unique_keys_of_new(new: &Self::New) -> Vec<UniqueKey>;

    /// Pin an organization-placed payload to the caller's organization.
    fn pin_organization(_new: &mut Self::New, _organization_id: i64) {}

    /// Record the creating user on families that track one.
    fn bind_owner(_new: &mut Self::New, _user_id: i64) {}
}

/// Families that support partial update and soft delete.
pub trait Mutable: Resource {
    type Patch: Send + Sync;

    /// Validate the values present in a patch.
    fn validate_patch(patch: &Self::Patch) -> Result<()>;

    /// Overwrite present fields; absent fields keep their current value.
    fn merge(&mut self, patch: Self::Patch);

    /// Cross-field checks on the merged record.
    fn validate_merged(&self) -> Result<()> {
        Ok(())
    }
}

/// Organization dimension shared by every list filter.
pub trait ListFilter {
    fn organization_id(&self) -> Option<i64>;
    fn set_organization_id(&mut self, organization_id: Option<i64>);

    /// Apply the caller's tenant scope to this filter.
    fn restrict_to(&mut self, scope: OrgScope) {
        let restricted = scope.restrict(self.organization_id());
        self.set_organization_id(restricted);
    }
}

// =============================================================================
// STORAGE CAPABILITIES
// =============================================================================

/// An open storage transaction.
///
/// Dropping a transaction without committing must discard its effects.
#[async_trait]
pub trait MutationTx: Send + Sized {
    /// Resolve an active parent chain to its organization, locking the chain
    /// for the rest of the transaction. `None` when any link is missing or
    /// inactive.
    async fn resolve_parent(&mut self, parent: ParentRef) -> Result<Option<i64>>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Per-family write capabilities inside a transaction.
#[async_trait]
pub trait EntityTx<R: Resource>: MutationTx {
    /// Load an active record and lock it for the rest of the transaction.
    async fn load_for_update(&mut self, id: i64) -> Result<Option<R>>;

    /// Whether an active record other than `exclude` already holds `key`.
    async fn key_in_use(&mut self, key: &UniqueKey, exclude: Option<i64>) -> Result<bool>;

    /// Insert with the initial status and audit stamp; returns the new id.
    async fn insert(&mut self, new: &R::New, stamp: &AuditStamp) -> Result<i64>;

    /// Soft-delete and rewrite the updated audit pair.
    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()>;
}

/// Persisting a merged record.
#[async_trait]
pub trait PatchTx<R: Mutable>: EntityTx<R> {
    async fn persist(&mut self, record: &R) -> Result<()>;
}

/// Every capability the admin service needs from one transaction.
pub trait AdminTx:
    PatchTx<Template>
    + PatchTx<Node>
    + PatchTx<Element>
    + PatchTx<Team>
    + PatchTx<Meeting>
    + EntityTx<Upload>
{
}

impl<T> AdminTx for T where
    T: PatchTx<Template>
        + PatchTx<Node>
        + PatchTx<Element>
        + PatchTx<Team>
        + PatchTx<Meeting>
        + EntityTx<Upload>
{
}

/// Opens transactions.
#[async_trait]
pub trait TxSource: Send + Sync {
    type Tx: AdminTx;

    async fn begin(&self) -> Result<Self::Tx>;

    /// Liveness probe. The default opens and discards a transaction.
    async fn ping(&self) -> Result<()> {
        let tx = self.begin().await?;
        tx.rollback().await
    }
}

/// Read path, outside any transaction.
#[async_trait]
pub trait EntityQuery<R: Resource>: Send + Sync {
    /// Fetch an active record visible in `scope`.
    async fn find(&self, id: i64, scope: OrgScope) -> Result<Option<R>>;

    /// Count and page through active records matching `filter`. The filter's
    /// organization has already been restricted to the caller's scope.
    async fn list(&self, filter: &R::Filter, page: &PageRequest) -> Result<Page<R>>;
}

/// A complete storage backend.
pub trait Store:
    TxSource
    + EntityQuery<Template>
    + EntityQuery<Node>
    + EntityQuery<Element>
    + EntityQuery<Team>
    + EntityQuery<Meeting>
    + EntityQuery<Upload>
    + Clone
    + 'static
{
}

impl<T> Store for T where
    T: TxSource
        + EntityQuery<Template>
        + EntityQuery<Node>
        + EntityQuery<Element>
        + EntityQuery<Team>
        + EntityQuery<Meeting>
        + EntityQuery<Upload>
        + Clone
        + 'static
{
}
