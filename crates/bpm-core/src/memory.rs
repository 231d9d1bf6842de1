//! In-memory storage backend.
//!
//! Implements the same storage traits as the PostgreSQL store. A transaction
//! holds the store lock and works on a copy of the tables; commit swaps the
//! copy in, rollback or drop discards it. Transactions are therefore fully
//! serialized, which is stricter than row locking but observably equivalent
//! for the validation core.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::identity::OrgScope;
use crate::models::{
    status, Audit, AuditStamp, Element, Meeting, Node, Team, Template, Upload,
};
use crate::pagination::{Page, PageRequest};
use crate::traits::{
    EntityQuery, EntityTx, ListFilter, ListOrder, Mutable, MutationTx, ParentKind, ParentRef,
    PatchTx, Placement, Resource, TxSource, UniqueKey,
};

/// One family's rows, keyed by id. Ids start at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct Table<R> {
    next_id: i64,
    rows: BTreeMap<i64, R>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<R: Resource> Table<R> {
    fn active(&self, id: i64) -> Option<&R> {
        self.rows
            .get(&id)
            .filter(|row| status::is_active(row.status()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    templates: Table<Template>,
    nodes: Table<Node>,
    elements: Table<Element>,
    teams: Table<Team>,
    meetings: Table<Meeting>,
    uploads: Table<Upload>,
}

impl Tables {
    /// Organization at the end of an active parent chain.
    fn resolve(&self, parent: ParentRef) -> Option<i64> {
        match parent.kind {
            ParentKind::Template => self
                .templates
                .active(parent.id)
                .map(|template| template.organization_id),
            ParentKind::Node => {
                let node = self.nodes.active(parent.id)?;
                self.resolve(ParentRef::template(node.template_id))
            }
        }
    }

    fn organization_of(&self, placement: Placement) -> Option<i64> {
        match placement {
            Placement::Organization(organization_id) => Some(organization_id),
            Placement::Parent(parent) => self.resolve(parent),
        }
    }
}

/// Families the in-memory store can hold.
pub trait MemoryRecord: Resource {
    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
    /// Row as inserted: initial status, audit from `stamp`.
    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self;
    fn set_status(&mut self, status: i32);
    fn matches(&self, filter: &Self::Filter) -> bool;
}

impl MemoryRecord for Template {
    fn table(tables: &Tables) -> &Table<Self> {
        &tables.templates
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.templates
    }

    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self {
        Template {
            id,
            organization_id: new.organization_id,
            name: new.name.clone(),
            template_type: new.template_type,
            description: new.description.clone(),
            event_json: new.event_json.clone(),
            status: status::INITIAL,
            audit: Audit::created(stamp),
        }
    }

    fn set_status(&mut self, status: i32) {
        self.status = status;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.matches(self)
    }
}

impl MemoryRecord for Node {
    fn table(tables: &Tables) -> &Table<Self> {
        &tables.nodes
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.nodes
    }

    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self {
        Node {
            id,
            template_id: new.template_id,
            name: new.name.clone(),
            node_type: new.node_type,
            sort: new.sort,
            event_json: new.event_json.clone(),
            status: status::INITIAL,
            audit: Audit::created(stamp),
        }
    }

    fn set_status(&mut self, status: i32) {
        self.status = status;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.matches(self)
    }
}

impl MemoryRecord for Element {
    fn table(tables: &Tables) -> &Table<Self> {
        &tables.elements
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.elements
    }

    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self {
        Element {
            id,
            node_id: new.node_id,
            name: new.name.clone(),
            label: new.label.clone(),
            element_type: new.element_type,
            required: new.required,
            sort: new.sort,
            options: new.options.clone(),
            default_value: new.default_value.clone(),
            status: status::INITIAL,
            audit: Audit::created(stamp),
        }
    }

    fn set_status(&mut self, status: i32) {
        self.status = status;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.matches(self)
    }
}

impl MemoryRecord for Team {
    fn table(tables: &Tables) -> &Table<Self> {
        &tables.teams
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.teams
    }

    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self {
        Team {
            id,
            organization_id: new.organization_id,
            name: new.name.clone(),
            leader: new.leader.clone(),
            phone: new.phone.clone(),
            description: new.description.clone(),
            status: status::INITIAL,
            audit: Audit::created(stamp),
        }
    }

    fn set_status(&mut self, status: i32) {
        self.status = status;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.matches(self)
    }
}

impl MemoryRecord for Meeting {
    fn table(tables: &Tables) -> &Table<Self> {
        &tables.meetings
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.meetings
    }

    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self {
        Meeting {
            id,
            organization_id: new.organization_id,
            user_id: new.user_id,
            name: new.name.clone(),
            topic: new.topic.clone(),
            location: new.location.clone(),
            start_at: new.start_at,
            end_at: new.end_at,
            status: status::INITIAL,
            audit: Audit::created(stamp),
        }
    }

    fn set_status(&mut self, status: i32) {
        self.status = status;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.matches(self)
    }
}

impl MemoryRecord for Upload {
    fn table(tables: &Tables) -> &Table<Self> {
        &tables.uploads
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.uploads
    }

    fn build(id: i64, new: &Self::New, stamp: &AuditStamp) -> Self {
        Upload {
            id,
            organization_id: new.organization_id,
            user_id: new.user_id,
            file_name: new.file_name.clone(),
            content_type: new.content_type.clone(),
            size_bytes: new.size_bytes,
            storage_key: new.storage_key.clone(),
            status: status::INITIAL,
            audit: Audit::created(stamp),
        }
    }

    fn set_status(&mut self, status: i32) {
        self.status = status;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.matches(self)
    }
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored row regardless of status, for inspecting soft deletes.
    pub async fn stored<R: MemoryRecord>(&self, id: i64) -> Option<R> {
        let tables = self.tables.lock().await;
        R::table(&tables).rows.get(&id).cloned()
    }
}

/// Open transaction over a working copy of the tables.
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl TxSource for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let work = (*guard).clone();
        Ok(MemoryTx { guard, work })
    }
}

#[async_trait]
impl MutationTx for MemoryTx {
    async fn resolve_parent(&mut self, parent: ParentRef) -> Result<Option<i64>> {
        Ok(self.work.resolve(parent))
    }

    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<R: MemoryRecord> EntityTx<R> for MemoryTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<R>> {
        Ok(R::table(&self.work).active(id).cloned())
    }

    async fn key_in_use(&mut self, key: &UniqueKey, exclude: Option<i64>) -> Result<bool> {
        Ok(R::table(&self.work).rows.values().any(|row| {
            status::is_active(row.status())
                && Some(row.id()) != exclude
                && row.unique_keys().contains(key)
        }))
    }

    async fn insert(&mut self, new: &R::New, stamp: &AuditStamp) -> Result<i64> {
        let table = R::table_mut(&mut self.work);
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(id, R::build(id, new, stamp));
        Ok(id)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        let row = R::table_mut(&mut self.work)
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("{} {}", R::KIND, id)))?;
        row.set_status(status::DELETED);
        row.audit_mut().touch(stamp);
        Ok(())
    }
}

#[async_trait]
impl<R: MemoryRecord + Mutable> PatchTx<R> for MemoryTx {
    async fn persist(&mut self, record: &R) -> Result<()> {
        R::table_mut(&mut self.work)
            .rows
            .insert(record.id(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl<R: MemoryRecord> EntityQuery<R> for MemoryStore {
    async fn find(&self, id: i64, scope: OrgScope) -> Result<Option<R>> {
        let tables = self.tables.lock().await;
        let found = R::table(&tables).active(id).filter(|row| {
            tables
                .organization_of(row.placement())
                .is_some_and(|organization_id| scope.admits(organization_id))
        });
        Ok(found.cloned())
    }

    async fn list(&self, filter: &R::Filter, page: &PageRequest) -> Result<Page<R>> {
        let tables = self.tables.lock().await;
        let wanted = filter.organization_id();
        let mut rows: Vec<&R> = R::table(&tables)
            .rows
            .values()
            .filter(|row| status::is_active(row.status()))
            .filter(|row| row.matches(filter))
            .filter(|row| match tables.organization_of(row.placement()) {
                Some(organization_id) => wanted.map_or(true, |w| w == organization_id),
                None => false,
            })
            .collect();

        match R::LIST_ORDER {
            ListOrder::NewestFirst => rows.sort_by(|a, b| b.id().cmp(&a.id())),
            ListOrder::BySort => rows.sort_by_key(|row| (row.sort(), row.id())),
        }

        let total = rows.len() as i64;
        let items = rows
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(Page::new(page, total, items))
    }
}
