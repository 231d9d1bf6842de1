//! Node storage. Reads join the owning template so only nodes with an
//! active template are visible, and tenant scope applies through it.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bpm_core::models::{status, AuditStamp, NewNode, Node, NodeFilter};
use bpm_core::{EntityTx, Error, ListFilter, OrgScope, Page, PageRequest, PatchTx, Result, UniqueKey};

use crate::list_query::{fetch_optional, fetch_page, ListQueryBuilder, ReadShape};
use crate::tx::{self, PgTx};

pub(crate) const TABLE: &str = "bpm_node";

const COLUMNS: &str = "n.id, n.template_id, n.name, n.node_type, n.sort, n.event_json, \
                       n.status, n.created_at, n.created_by, n.updated_at, n.updated_by";

const SHAPE: ReadShape = ReadShape {
    table: TABLE,
    columns: COLUMNS,
    from: "bpm_node n JOIN bpm_template t ON t.id = n.template_id AND t.status > 0",
    order_by: "n.sort ASC, n.id ASC",
};

fn map_row(row: &PgRow) -> Node {
    Node {
        id: row.get("id"),
        template_id: row.get("template_id"),
        name: row.get("name"),
        node_type: row.get("node_type"),
        sort: row.get("sort"),
        event_json: row.get("event_json"),
        status: row.get("status"),
        audit: tx::audit_from_row(row),
    }
}

/// Read path for nodes.
#[derive(Debug, Clone)]
pub struct PgNodeRepository {
    pool: PgPool,
}

impl PgNodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64, scope: OrgScope) -> Result<Option<Node>> {
        let builder = ListQueryBuilder::new("n.status > 0")
            .eq_i64("n.id", Some(id))
            .eq_i64("t.organization_id", scope.tenant());
        fetch_optional(&self.pool, &SHAPE, &builder, map_row).await
    }

    pub async fn list(&self, filter: &NodeFilter, page: &PageRequest) -> Result<Page<Node>> {
        let builder = ListQueryBuilder::new("n.status > 0")
            .eq_i64("t.organization_id", filter.organization_id())
            .eq_i64("n.template_id", filter.template_id)
            .contains("n.name", filter.name());
        fetch_page(&self.pool, &SHAPE, &builder, page, map_row).await
    }
}

#[async_trait]
impl EntityTx<Node> for PgTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<Node>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bpm_node n WHERE n.id = $1 AND n.status > 0 FOR UPDATE",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **self.conn())
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(map_row))
    }

    async fn key_in_use(&mut self, key: &UniqueKey, exclude: Option<i64>) -> Result<bool> {
        tx::key_in_use(self, TABLE, key, exclude).await
    }

    async fn insert(&mut self, new: &NewNode, stamp: &AuditStamp) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO bpm_node
                (template_id, name, node_type, sort, event_json,
                 status, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7, $8)
            RETURNING id
            "#,
        )
        .bind(new.template_id)
        .bind(&new.name)
        .bind(new.node_type)
        .bind(new.sort)
        .bind(&new.event_json)
        .bind(status::INITIAL)
        .bind(stamp.at)
        .bind(stamp.by)
        .fetch_one(&mut **self.conn())
        .await
        .map_err(tx::classify)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        tx::mark_deleted(self, TABLE, "node", id, stamp).await
    }
}

#[async_trait]
impl PatchTx<Node> for PgTx {
    async fn persist(&mut self, record: &Node) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bpm_node
            SET name = $2, node_type = $3, sort = $4, event_json = $5,
                status = $6, updated_at = $7, updated_by = $8
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.node_type)
        .bind(record.sort)
        .bind(&record.event_json)
        .bind(record.status)
        .bind(record.audit.updated_at)
        .bind(record.audit.updated_by)
        .execute(&mut **self.conn())
        .await
        .map_err(tx::classify)?;
        Ok(())
    }
}
