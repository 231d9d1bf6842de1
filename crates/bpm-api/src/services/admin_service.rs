//! Service facade over the validation core and the query layer.
//!
//! Handlers talk only to [`AdminService`]. It owns the store, passes the
//! caller identity through to every operation, applies tenant scoping to
//! reads and logs mutation outcomes. Rejections are logged by the
//! validation core when the transaction is rolled back.

use std::time::Instant;

use bpm_core::{
    validation, EntityQuery, EntityTx, Error, Identity, ListFilter, Mutable, Page, PageRequest,
    PatchTx, Resource, Result, Store, TxSource,
};
use tracing::{debug, info};

/// Per-resource operations for every family the store serves.
#[derive(Debug, Clone)]
pub struct AdminService<S> {
    store: S,
}

impl<S: Store> AdminService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active record visible to the caller, or `NotFound`.
    pub async fn get<R>(&self, id: i64, caller: &Identity) -> Result<R>
    where
        R: Resource,
        S: EntityQuery<R>,
    {
        <S as EntityQuery<R>>::find(&self.store, id, caller.scope())
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {}", R::KIND, id)))
    }

    /// One page of active records matching `filter`, restricted to the
    /// caller's organization unless the caller is global.
    pub async fn list<R>(
        &self,
        mut filter: R::Filter,
        page: PageRequest,
        caller: &Identity,
    ) -> Result<Page<R>>
    where
        R: Resource,
        S: EntityQuery<R>,
    {
        page.validate()?;
        filter.restrict_to(caller.scope());

        let start = Instant::now();
        let result = <S as EntityQuery<R>>::list(&self.store, &filter, &page).await?;
        debug!(
            subsystem = "api",
            component = "admin_service",
            op = "list",
            resource = R::KIND,
            user_id = caller.user_id,
            organization_id = filter.organization_id(),
            result_count = result.items.len(),
            total = result.total,
            duration_ms = start.elapsed().as_millis() as u64,
            "List served"
        );
        Ok(result)
    }

    pub async fn create<R>(&self, new: R::New, caller: &Identity) -> Result<R>
    where
        R: Resource,
        S::Tx: EntityTx<R>,
    {
        let start = Instant::now();
        let record = validation::create::<R, S>(&self.store, new, caller).await?;
        info!(
            subsystem = "api",
            component = "admin_service",
            op = "create",
            resource = R::KIND,
            record_id = record.id(),
            user_id = caller.user_id,
            organization_id = caller.organization_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Record created"
        );
        Ok(record)
    }

    pub async fn update<R>(&self, id: i64, patch: R::Patch, caller: &Identity) -> Result<R>
    where
        R: Mutable,
        S::Tx: PatchTx<R>,
    {
        let start = Instant::now();
        let record = validation::update::<R, S>(&self.store, id, patch, caller).await?;
        info!(
            subsystem = "api",
            component = "admin_service",
            op = "update",
            resource = R::KIND,
            record_id = id,
            user_id = caller.user_id,
            organization_id = caller.organization_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Record updated"
        );
        Ok(record)
    }

    pub async fn delete<R>(&self, id: i64, caller: &Identity) -> Result<()>
    where
        R: Mutable,
        S::Tx: EntityTx<R>,
    {
        let start = Instant::now();
        validation::delete::<R, S>(&self.store, id, caller).await?;
        info!(
            subsystem = "api",
            component = "admin_service",
            op = "delete",
            resource = R::KIND,
            record_id = id,
            user_id = caller.user_id,
            organization_id = caller.organization_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Record deleted"
        );
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        TxSource::ping(&self.store).await
    }
}
