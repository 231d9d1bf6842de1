//! Transactional validation core.
//!
//! Each mutating intent runs as one transaction opened from a [`TxSource`]:
//! shape validation happens first, outside any transaction, then scope,
//! ownership, reference and uniqueness checks run inside it, before any
//! write. A failed check rolls the transaction back and returns the typed
//! error, so the stored state is exactly what it was before the call.

use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::identity::{Identity, OrgScope};
use crate::models::AuditStamp;
use crate::traits::{
    EntityTx, Mutable, MutationTx, ParentRef, PatchTx, Placement, Resource, TxSource, UniqueKey,
};

/// Create a record from `new` on behalf of `caller` and return it as stored.
pub async fn create<R, S>(source: &S, mut new: R::New, caller: &Identity) -> Result<R>
where
    R: Resource,
    S: TxSource,
    S::Tx: EntityTx<R>,
{
    R::validate_new(&new)?;
    R::bind_owner(&mut new, caller.user_id);

    let scope = caller.scope();
    if let Placement::Organization(declared) = R::placement_of_new(&new) {
        match scope {
            OrgScope::Tenant(own) => {
                if declared != 0 && declared != own {
                    return Err(Error::ScopeMismatch(format!(
                        "cannot create {} in organization {} from organization {}",
                        R::KIND,
                        declared,
                        own
                    )));
                }
                R::pin_organization(&mut new, own);
            }
            // Organization 0 is the global caller's marker, not a tenant.
            OrgScope::Global if declared <= 0 => {
                return Err(Error::InvalidInput(format!(
                    "organization_id is required to create a {} as a global caller",
                    R::KIND
                )));
            }
            OrgScope::Global => {}
        }
    }

    let stamp = AuditStamp::now(caller);
    let mut tx = source.begin().await?;
    let result = create_in::<R, S::Tx>(&mut tx, &new, scope, &stamp).await;
    finish(tx, result, R::KIND, "create").await
}

/// Apply `patch` to the active record `id` and return the merged record.
pub async fn update<R, S>(source: &S, id: i64, patch: R::Patch, caller: &Identity) -> Result<R>
where
    R: Mutable,
    S: TxSource,
    S::Tx: PatchTx<R>,
{
    R::validate_patch(&patch)?;

    let stamp = AuditStamp::now(caller);
    let mut tx = source.begin().await?;
    let result = update_in::<R, S::Tx>(&mut tx, id, patch, caller, &stamp).await;
    finish(tx, result, R::KIND, "update").await
}

/// Soft-delete the active record `id`.
pub async fn delete<R, S>(source: &S, id: i64, caller: &Identity) -> Result<()>
where
    R: Mutable,
    S: TxSource,
    S::Tx: EntityTx<R>,
{
    let stamp = AuditStamp::now(caller);
    let mut tx = source.begin().await?;
    let result = delete_in::<R, S::Tx>(&mut tx, id, caller, &stamp).await;
    finish(tx, result, R::KIND, "delete").await
}

async fn create_in<R, T>(
    tx: &mut T,
    new: &R::New,
    scope: OrgScope,
    stamp: &AuditStamp,
) -> Result<R>
where
    R: Resource,
    T: EntityTx<R>,
{
    if let Placement::Parent(parent) = R::placement_of_new(new) {
        authorize_parent(tx, parent, scope).await?;
    }
    ensure_unique::<R, T>(tx, R::unique_keys_of_new(new), None).await?;

    let id = tx.insert(new, stamp).await?;
    debug!(
        subsystem = "core",
        component = "mutations",
        op = "create",
        resource = R::KIND,
        record_id = id,
        "Row inserted"
    );
    tx.load_for_update(id)
        .await?
        .ok_or_else(|| not_found::<R>(id))
}

async fn update_in<R, T>(
    tx: &mut T,
    id: i64,
    patch: R::Patch,
    caller: &Identity,
    stamp: &AuditStamp,
) -> Result<R>
where
    R: Mutable,
    T: PatchTx<R>,
{
    let current = tx.load_for_update(id).await?.ok_or_else(|| not_found::<R>(id))?;
    authorize_existing::<R, T>(tx, &current, caller).await?;

    let mut merged = current.clone();
    merged.merge(patch);
    merged.validate_merged()?;

    // Only keys whose value the patch changed can newly collide.
    let original = current.unique_keys();
    let changed: Vec<UniqueKey> = merged
        .unique_keys()
        .into_iter()
        .filter(|key| !original.contains(key))
        .collect();
    ensure_unique::<R, T>(tx, changed, Some(id)).await?;

    merged.audit_mut().touch(stamp);
    tx.persist(&merged).await?;
    tx.load_for_update(id)
        .await?
        .ok_or_else(|| not_found::<R>(id))
}

async fn delete_in<R, T>(tx: &mut T, id: i64, caller: &Identity, stamp: &AuditStamp) -> Result<()>
where
    R: Resource,
    T: EntityTx<R>,
{
    let current = tx.load_for_update(id).await?.ok_or_else(|| not_found::<R>(id))?;
    authorize_existing::<R, T>(tx, &current, caller).await?;
    tx.mark_deleted(id, stamp).await
}

/// Resolve `parent` to its organization and check it against `scope`.
///
/// A missing, inactive or foreign parent is reported the same way, so a
/// scoped caller cannot probe other tenants' ids.
async fn authorize_parent<T: MutationTx>(
    tx: &mut T,
    parent: ParentRef,
    scope: OrgScope,
) -> Result<i64> {
    match tx.resolve_parent(parent).await? {
        Some(organization_id) if scope.admits(organization_id) => Ok(organization_id),
        Some(organization_id) => {
            debug!(
                subsystem = "core",
                component = "mutations",
                parent = %parent,
                organization_id,
                "Parent outside caller scope"
            );
            Err(Error::ReferenceNotFound(parent.to_string()))
        }
        None => Err(Error::ReferenceNotFound(parent.to_string())),
    }
}

/// Scope and ownership checks against a loaded row.
async fn authorize_existing<R, T>(tx: &mut T, record: &R, caller: &Identity) -> Result<()>
where
    R: Resource,
    T: EntityTx<R>,
{
    let scope = caller.scope();
    match record.placement() {
        Placement::Organization(organization_id) => {
            if !scope.admits(organization_id) {
                return Err(Error::ScopeMismatch(format!(
                    "{} {} is outside organization {}",
                    R::KIND,
                    record.id(),
                    caller.organization_id
                )));
            }
        }
        Placement::Parent(parent) => {
            authorize_parent(tx, parent, scope).await?;
        }
    }

    if R::OWNER_GATED && !caller.is_global() && record.owner_id() != Some(caller.user_id) {
        return Err(Error::Forbidden(format!(
            "{} {} belongs to another user",
            R::KIND,
            record.id()
        )));
    }
    Ok(())
}

async fn ensure_unique<R, T>(tx: &mut T, keys: Vec<UniqueKey>, exclude: Option<i64>) -> Result<()>
where
    R: Resource,
    T: EntityTx<R>,
{
    for key in keys {
        if tx.key_in_use(&key, exclude).await? {
            return Err(Error::duplicate(key.field, &key.value));
        }
    }
    Ok(())
}

/// Commit on success; otherwise roll back and hand the error back unchanged.
async fn finish<T, V>(tx: T, result: Result<V>, resource: &'static str, op: &'static str) -> Result<V>
where
    T: MutationTx,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    subsystem = "core",
                    component = "mutations",
                    op,
                    resource,
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            if e.is_rejection() {
                warn!(
                    subsystem = "core",
                    component = "mutations",
                    op,
                    resource,
                    error_kind = e.kind(),
                    error = %e,
                    "Mutation rejected, transaction rolled back"
                );
            } else {
                error!(
                    subsystem = "core",
                    component = "mutations",
                    op,
                    resource,
                    error_kind = e.kind(),
                    error = %e,
                    "Mutation failed, transaction rolled back"
                );
            }
            Err(e)
        }
    }
}

fn not_found<R: Resource>(id: i64) -> Error {
    Error::NotFound(format!("{} {}", R::KIND, id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{
        status, Element, Meeting, NewElement, NewMeeting, NewNode, NewTeam, NewTemplate, NewUpload,
        Node, Team, TeamFilter, Template, Upload,
    };
    use crate::pagination::PageRequest;
    use crate::traits::EntityQuery;

    fn tenant(organization_id: i64) -> Identity {
        Identity::new("tenant", 100 + organization_id, organization_id)
    }

    fn global() -> Identity {
        Identity::new("root", 1, 0)
    }

    fn new_template(name: &str, organization_id: i64) -> NewTemplate {
        serde_json::from_value(json!({
            "organization_id": organization_id,
            "name": name,
            "template_type": 1
        }))
        .unwrap()
    }

    fn new_team(name: &str) -> NewTeam {
        serde_json::from_value(json!({"name": name, "leader": "X", "phone": "1"})).unwrap()
    }

    fn new_node(template_id: i64, name: &str) -> NewNode {
        serde_json::from_value(json!({"template_id": template_id, "name": name, "node_type": 1}))
            .unwrap()
    }

    fn new_element(node_id: i64, name: &str, sort: i32) -> NewElement {
        serde_json::from_value(json!({
            "node_id": node_id,
            "name": name,
            "element_type": 1,
            "sort": sort
        }))
        .unwrap()
    }

    fn new_meeting(name: &str) -> NewMeeting {
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        NewMeeting {
            organization_id: 0,
            user_id: 0,
            name: name.to_string(),
            topic: "weekly".into(),
            location: "room 1".into(),
            start_at: start,
            end_at: start + Duration::minutes(30),
        }
    }

    async fn find<R: Resource>(store: &MemoryStore, id: i64, caller: &Identity) -> Option<R>
    where
        MemoryStore: EntityQuery<R>,
    {
        <MemoryStore as EntityQuery<R>>::find(store, id, caller.scope())
            .await
            .unwrap()
    }

    async fn team_count(store: &MemoryStore) -> i64 {
        <MemoryStore as EntityQuery<Team>>::list(store, &TeamFilter::default(), &PageRequest::default())
            .await
            .unwrap()
            .total
    }

    /// Template name uniqueness follows organization and soft deletion.
    #[tokio::test]
    async fn test_template_lifecycle_scenario() {
        let store = MemoryStore::new();
        let org5 = tenant(5);
        let org6 = tenant(6);

        let t1: Template = create::<Template, _>(&store, new_template("T1", 5), &org5)
            .await
            .unwrap();
        assert_eq!(t1.id, 1);
        assert_eq!(t1.status, status::ENABLED);

        let err = create::<Template, _>(&store, new_template("T1", 5), &org5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref field, .. } if field == "name"));

        create::<Template, _>(&store, new_template("T1", 6), &org6)
            .await
            .unwrap();

        delete::<Template, _>(&store, 1, &org5).await.unwrap();

        let again: Template = create::<Template, _>(&store, new_template("T1", 5), &org5)
            .await
            .unwrap();
        assert_ne!(again.id, 1);
    }

    #[tokio::test]
    async fn test_create_stamps_audit_and_forces_status() {
        let store = MemoryStore::new();
        let caller = tenant(5);
        let team: Team = create::<Team, _>(&store, new_team("A"), &caller).await.unwrap();
        assert_eq!(team.status, status::ENABLED);
        assert_eq!(team.organization_id, 5);
        assert_eq!(team.audit.created_by, caller.user_id);
        assert_eq!(team.audit.updated_by, caller.user_id);
        assert_eq!(team.audit.created_at, team.audit.updated_at);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_absent_fields() {
        let store = MemoryStore::new();
        let caller = tenant(5);
        let team: Team = create::<Team, _>(&store, new_team("A"), &caller).await.unwrap();

        let patch = serde_json::from_value(json!({"leader": "Y"})).unwrap();
        let updated: Team = update::<Team, _>(&store, team.id, patch, &caller)
            .await
            .unwrap();
        assert_eq!(updated.name, "A");
        assert_eq!(updated.leader, "Y");
        assert_eq!(updated.phone, "1");
        assert_eq!(updated.audit.created_at, team.audit.created_at);
        assert!(updated.audit.updated_at >= team.audit.updated_at);
    }

    #[tokio::test]
    async fn test_update_without_key_change_does_not_self_collide() {
        let store = MemoryStore::new();
        let caller = tenant(5);
        let team: Team = create::<Team, _>(&store, new_team("A"), &caller).await.unwrap();

        let patch = serde_json::from_value(json!({"name": "A", "phone": "2"})).unwrap();
        let updated: Team = update::<Team, _>(&store, team.id, patch, &caller)
            .await
            .unwrap();
        assert_eq!(updated.phone, "2");
    }

    #[tokio::test]
    async fn test_failed_update_leaves_row_unchanged() {
        let store = MemoryStore::new();
        let caller = tenant(5);
        create::<Team, _>(&store, new_team("A"), &caller).await.unwrap();
        let b: Team = create::<Team, _>(&store, new_team("B"), &caller).await.unwrap();

        let patch = serde_json::from_value(json!({"name": "A", "leader": "Z"})).unwrap();
        let err = update::<Team, _>(&store, b.id, patch, &caller).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));

        let stored: Team = find(&store, b.id, &caller).await.unwrap();
        assert_eq!(stored, b);
    }

    #[tokio::test]
    async fn test_soft_delete_excludes_row() {
        let store = MemoryStore::new();
        let caller = tenant(5);
        let team: Team = create::<Team, _>(&store, new_team("A"), &caller).await.unwrap();

        delete::<Team, _>(&store, team.id, &caller).await.unwrap();

        assert!(find::<Team>(&store, team.id, &caller).await.is_none());
        assert_eq!(team_count(&store).await, 0);
        let err = delete::<Team, _>(&store, team.id, &caller).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let stored: Team = store.stored(team.id).await.unwrap();
        assert_eq!(stored.status, status::DELETED);
        assert_eq!(stored.audit.created_at, team.audit.created_at);
    }

    #[tokio::test]
    async fn test_update_of_deleted_row_is_not_found() {
        let store = MemoryStore::new();
        let caller = tenant(5);
        let team: Team = create::<Team, _>(&store, new_team("A"), &caller).await.unwrap();
        delete::<Team, _>(&store, team.id, &caller).await.unwrap();

        let patch = serde_json::from_value(json!({"leader": "Y"})).unwrap();
        let err = update::<Team, _>(&store, team.id, patch, &caller)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_tenant_cannot_touch_other_organization() {
        let store = MemoryStore::new();
        let org9 = tenant(9);
        let org7 = tenant(7);
        let team: Team = create::<Team, _>(&store, new_team("A"), &org9).await.unwrap();

        let patch = serde_json::from_value(json!({"leader": "Y"})).unwrap();
        let err = update::<Team, _>(&store, team.id, patch, &org7)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScopeMismatch(_)));

        let err = delete::<Team, _>(&store, team.id, &org7).await.unwrap_err();
        assert!(matches!(err, Error::ScopeMismatch(_)));

        assert!(find::<Team>(&store, team.id, &org7).await.is_none());
        let stored: Team = find(&store, team.id, &org9).await.unwrap();
        assert_eq!(stored, team);
    }

    #[tokio::test]
    async fn test_tenant_cannot_create_in_other_organization() {
        let store = MemoryStore::new();
        let err = create::<Template, _>(&store, new_template("T1", 9), &tenant(7))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScopeMismatch(_)));

        let pinned: Template = create::<Template, _>(&store, new_template("T1", 0), &tenant(7))
            .await
            .unwrap();
        assert_eq!(pinned.organization_id, 7);
    }

    #[tokio::test]
    async fn test_global_caller_creates_in_any_organization() {
        let store = MemoryStore::new();
        let created: Template = create::<Template, _>(&store, new_template("T1", 9), &global())
            .await
            .unwrap();
        assert_eq!(created.organization_id, 9);

        delete::<Template, _>(&store, created.id, &global())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_global_caller_must_name_organization() {
        let store = MemoryStore::new();
        let err = create::<Template, _>(&store, new_template("T1", 0), &global())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("organization_id")));

        let err = create::<Team, _>(&store, new_team("Ops"), &global())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let page = <MemoryStore as EntityQuery<Template>>::list(
            &store,
            &Default::default(),
            &PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_element_requires_active_parent_chain() {
        let store = MemoryStore::new();
        let org5 = tenant(5);
        let template: Template = create::<Template, _>(&store, new_template("T1", 5), &org5)
            .await
            .unwrap();
        let node: Node = create::<Node, _>(&store, new_node(template.id, "start"), &org5)
            .await
            .unwrap();

        let element: Element = create::<Element, _>(&store, new_element(node.id, "amount", 1), &org5)
            .await
            .unwrap();
        assert_eq!(element.node_id, node.id);

        let err = create::<Element, _>(&store, new_element(999, "other", 2), &org5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));

        delete::<Template, _>(&store, template.id, &org5)
            .await
            .unwrap();

        let err = create::<Element, _>(&store, new_element(node.id, "other", 2), &org5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));

        let patch = serde_json::from_value(json!({"label": "Total"})).unwrap();
        let err = update::<Element, _>(&store, element.id, patch, &org5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));
    }

    #[tokio::test]
    async fn test_foreign_parent_is_reference_not_found() {
        let store = MemoryStore::new();
        let template: Template = create::<Template, _>(&store, new_template("T1", 5), &tenant(5))
            .await
            .unwrap();

        let err = create::<Node, _>(&store, new_node(template.id, "start"), &tenant(6))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));

        create::<Node, _>(&store, new_node(template.id, "start"), &global())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_element_name_and_sort_unique_within_node() {
        let store = MemoryStore::new();
        let org5 = tenant(5);
        let template: Template = create::<Template, _>(&store, new_template("T1", 5), &org5)
            .await
            .unwrap();
        let first: Node = create::<Node, _>(&store, new_node(template.id, "a"), &org5)
            .await
            .unwrap();
        let second: Node = create::<Node, _>(&store, new_node(template.id, "b"), &org5)
            .await
            .unwrap();

        create::<Element, _>(&store, new_element(first.id, "amount", 1), &org5)
            .await
            .unwrap();
        let b: Element = create::<Element, _>(&store, new_element(first.id, "reason", 2), &org5)
            .await
            .unwrap();

        let err = create::<Element, _>(&store, new_element(first.id, "other", 1), &org5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref field, .. } if field == "sort"));

        // Same keys under another node are fine.
        create::<Element, _>(&store, new_element(second.id, "amount", 1), &org5)
            .await
            .unwrap();

        let patch = serde_json::from_value(json!({"sort": 1})).unwrap();
        let err = update::<Element, _>(&store, b.id, patch, &org5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref field, ref value } if field == "sort" && value == "1"));
    }

    #[tokio::test]
    async fn test_meeting_update_restricted_to_creator() {
        let store = MemoryStore::new();
        let creator = Identity::new("alice", 10, 7);
        let colleague = Identity::new("bob", 11, 7);

        let meeting: Meeting = create::<Meeting, _>(&store, new_meeting("standup"), &creator)
            .await
            .unwrap();
        assert_eq!(meeting.user_id, 10);

        let patch = serde_json::from_value(json!({"topic": "retro"})).unwrap();
        let err = update::<Meeting, _>(&store, meeting.id, patch, &colleague)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = delete::<Meeting, _>(&store, meeting.id, &colleague)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let patch = serde_json::from_value(json!({"topic": "retro"})).unwrap();
        let updated: Meeting = update::<Meeting, _>(&store, meeting.id, patch, &global())
            .await
            .unwrap();
        assert_eq!(updated.topic, "retro");
        assert_eq!(updated.user_id, 10);
    }

    #[tokio::test]
    async fn test_meeting_window_checked_after_merge() {
        let store = MemoryStore::new();
        let creator = Identity::new("alice", 10, 7);
        let meeting: Meeting = create::<Meeting, _>(&store, new_meeting("standup"), &creator)
            .await
            .unwrap();

        let patch = serde_json::from_value(json!({"end_at": "2026-10-19T08:00:00Z"})).unwrap();
        let err = update::<Meeting, _>(&store, meeting.id, patch, &creator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let stored: Meeting = find(&store, meeting.id, &creator).await.unwrap();
        assert_eq!(stored.end_at, meeting.end_at);
    }

    #[tokio::test]
    async fn test_shape_errors_reported_before_storage() {
        let store = MemoryStore::new();
        let err = create::<Team, _>(&store, new_team("  "), &tenant(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let patch = serde_json::from_value(json!({"status": -1})).unwrap();
        let err = update::<Team, _>(&store, 1, patch, &tenant(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(team_count(&store).await, 0);
    }

    #[tokio::test]
    async fn test_upload_records_uploader() {
        let store = MemoryStore::new();
        let caller = Identity::new("alice", 10, 7);
        let new: NewUpload = serde_json::from_value(json!({
            "file_name": "a.pdf",
            "content_type": "application/pdf",
            "size_bytes": 1024,
            "storage_key": "2026/10/a.pdf"
        }))
        .unwrap();

        let upload: Upload = create::<Upload, _>(&store, new, &caller).await.unwrap();
        assert_eq!(upload.user_id, 10);
        assert_eq!(upload.organization_id, 7);
    }
}
