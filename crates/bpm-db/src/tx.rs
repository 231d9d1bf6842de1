//! Transaction handle and the statements shared by every family.
//!
//! Rows under mutation are locked `FOR UPDATE`; parent chains are locked
//! `FOR SHARE` so a parent cannot be soft-deleted between the check and the
//! child write. Dropping a [`PgTx`] without committing rolls it back.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use bpm_core::models::{status, Audit, AuditStamp};
use bpm_core::{Error, KeyValue, MutationTx, ParentKind, ParentRef, Placement, Result, UniqueKey};

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// An open PostgreSQL transaction.
pub struct PgTx {
    inner: Transaction<'static, Postgres>,
}

impl PgTx {
    pub(crate) fn new(inner: Transaction<'static, Postgres>) -> Self {
        Self { inner }
    }

    pub(crate) fn conn(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.inner
    }
}

#[async_trait]
impl MutationTx for PgTx {
    async fn resolve_parent(&mut self, parent: ParentRef) -> Result<Option<i64>> {
        let sql = match parent.kind {
            ParentKind::Template => {
                "SELECT t.organization_id FROM bpm_template t \
                 WHERE t.id = $1 AND t.status > 0 FOR SHARE"
            }
            ParentKind::Node => {
                "SELECT t.organization_id FROM bpm_node n \
                 JOIN bpm_template t ON t.id = n.template_id \
                 WHERE n.id = $1 AND n.status > 0 AND t.status > 0 FOR SHARE"
            }
        };
        let row = sqlx::query(sql)
            .bind(parent.id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(Error::Database)?;

        let organization_id = row.map(|r| r.get::<i64, _>("organization_id"));
        debug!(
            subsystem = "db",
            component = "tx",
            op = "resolve_parent",
            parent = %parent,
            resolved = organization_id.is_some(),
            "Parent chain resolved"
        );
        Ok(organization_id)
    }

    async fn commit(self) -> Result<()> {
        self.inner.commit().await.map_err(Error::Database)
    }

    async fn rollback(self) -> Result<()> {
        self.inner.rollback().await.map_err(Error::Database)
    }
}

/// Column a uniqueness scope is stored in, with its value.
pub(crate) fn scope_column(within: Placement) -> (&'static str, i64) {
    match within {
        Placement::Organization(organization_id) => ("organization_id", organization_id),
        Placement::Parent(ParentRef {
            kind: ParentKind::Template,
            id,
        }) => ("template_id", id),
        Placement::Parent(ParentRef {
            kind: ParentKind::Node,
            id,
        }) => ("node_id", id),
    }
}

pub(crate) async fn key_in_use(
    tx: &mut PgTx,
    table: &str,
    key: &UniqueKey,
    exclude: Option<i64>,
) -> Result<bool> {
    let (scope, scope_id) = scope_column(key.within);
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1 AND {} = $2 AND status > 0 AND id <> $3)",
        table, key.field, scope
    );
    let query = match &key.value {
        KeyValue::Text(value) => sqlx::query_scalar::<_, bool>(&sql).bind(value.as_str()),
        KeyValue::Int(value) => sqlx::query_scalar::<_, bool>(&sql).bind(*value),
    };
    query
        .bind(scope_id)
        .bind(exclude.unwrap_or(0))
        .fetch_one(&mut **tx.conn())
        .await
        .map_err(Error::Database)
}

pub(crate) async fn mark_deleted(
    tx: &mut PgTx,
    table: &str,
    kind: &str,
    id: i64,
    stamp: &AuditStamp,
) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET status = $2, updated_at = $3, updated_by = $4 WHERE id = $1 AND status > 0",
        table
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(status::DELETED)
        .bind(stamp.at)
        .bind(stamp.by)
        .execute(&mut **tx.conn())
        .await
        .map_err(Error::Database)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", kind, id)));
    }
    Ok(())
}

pub(crate) fn audit_from_row(row: &PgRow) -> Audit {
    Audit {
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    }
}

/// Map a write error, turning unique-index violations into `DuplicateKey`.
///
/// Constraint names follow `uq_<table>_<field>`.
pub(crate) fn classify(err: sqlx::Error) -> Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = db_err
                .constraint()
                .and_then(|c| c.rsplit('_').next())
                .unwrap_or("key")
                .to_string();
            let detail = db_err
                .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .map(duplicate_value)
                .unwrap_or_default();
            return Error::DuplicateKey {
                field,
                value: detail,
            };
        }
    }
    Error::Database(err)
}

/// Pull the key's own value out of a unique-violation detail such as
/// `Key (organization_id, name)=(5, T1) already exists.`
fn duplicate_value(detail: &str) -> String {
    detail
        .split_once(")=(")
        .and_then(|(_, rest)| rest.rsplit_once(") already exists"))
        .and_then(|(values, _)| values.rsplit(", ").next())
        .map(|value| format!("'{}'", value))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_column_per_placement() {
        assert_eq!(
            scope_column(Placement::Organization(5)),
            ("organization_id", 5)
        );
        assert_eq!(
            scope_column(Placement::Parent(ParentRef::template(3))),
            ("template_id", 3)
        );
        assert_eq!(
            scope_column(Placement::Parent(ParentRef::node(4))),
            ("node_id", 4)
        );
    }

    #[test]
    fn test_duplicate_value_from_detail() {
        assert_eq!(
            duplicate_value("Key (organization_id, name)=(5, T1) already exists."),
            "'T1'"
        );
        assert_eq!(duplicate_value("something else"), "");
    }

    #[test]
    fn test_classify_passes_through_other_errors() {
        assert!(matches!(
            classify(sqlx::Error::RowNotFound),
            Error::Database(_)
        ));
    }
}
