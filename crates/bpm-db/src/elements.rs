//! Element storage. Reads join node and template; an element is visible only
//! while its whole chain is active.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bpm_core::models::{status, AuditStamp, Element, ElementFilter, NewElement};
use bpm_core::{EntityTx, Error, ListFilter, OrgScope, Page, PageRequest, PatchTx, Result, UniqueKey};

use crate::list_query::{fetch_optional, fetch_page, ListQueryBuilder, ReadShape};
use crate::tx::{self, PgTx};

pub(crate) const TABLE: &str = "bpm_element";

const COLUMNS: &str = "e.id, e.node_id, e.name, e.label, e.element_type, e.required, e.sort, \
                       e.options, e.default_value, e.status, \
                       e.created_at, e.created_by, e.updated_at, e.updated_by";

const SHAPE: ReadShape = ReadShape {
    table: TABLE,
    columns: COLUMNS,
    from: "bpm_element e \
           JOIN bpm_node n ON n.id = e.node_id AND n.status > 0 \
           JOIN bpm_template t ON t.id = n.template_id AND t.status > 0",
    order_by: "e.sort ASC, e.id ASC",
};

fn map_row(row: &PgRow) -> Element {
    Element {
        id: row.get("id"),
        node_id: row.get("node_id"),
        name: row.get("name"),
        label: row.get("label"),
        element_type: row.get("element_type"),
        required: row.get("required"),
        sort: row.get("sort"),
        options: row.get("options"),
        default_value: row.get("default_value"),
        status: row.get("status"),
        audit: tx::audit_from_row(row),
    }
}

/// Read path for elements.
#[derive(Debug, Clone)]
pub struct PgElementRepository {
    pool: PgPool,
}

impl PgElementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64, scope: OrgScope) -> Result<Option<Element>> {
        let builder = ListQueryBuilder::new("e.status > 0")
            .eq_i64("e.id", Some(id))
            .eq_i64("t.organization_id", scope.tenant());
        fetch_optional(&self.pool, &SHAPE, &builder, map_row).await
    }

    pub async fn list(&self, filter: &ElementFilter, page: &PageRequest) -> Result<Page<Element>> {
        let builder = ListQueryBuilder::new("e.status > 0")
            .eq_i64("t.organization_id", filter.organization_id())
            .eq_i64("e.node_id", filter.node_id)
            .contains("e.name", filter.name())
            .eq_i32("e.element_type", filter.element_type);
        fetch_page(&self.pool, &SHAPE, &builder, page, map_row).await
    }
}

#[async_trait]
impl EntityTx<Element> for PgTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<Element>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bpm_element e WHERE e.id = $1 AND e.status > 0 FOR UPDATE",
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

    async fn insert(&mut self, new: &NewElement, stamp: &AuditStamp) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO bpm_element
                (node_id, name, label, element_type, required, sort, options, default_value,
                 status, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $10, $11)
            RETURNING id
            "#,
        )
        .bind(new.node_id)
        .bind(&new.name)
        .bind(&new.label)
        .bind(new.element_type)
        .bind(new.required)
        .bind(new.sort)
        .bind(&new.options)
        .bind(&new.default_value)
        .bind(status::INITIAL)
        .bind(stamp.at)
        .bind(stamp.by)
        .fetch_one(&mut **self.conn())
        .await
        .map_err(tx::classify)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        tx::mark_deleted(self, TABLE, "element", id, stamp).await
    }
}

#[async_trait]
impl PatchTx<Element> for PgTx {
    async fn persist(&mut self, record: &Element) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bpm_element
            SET name = $2, label = $3, element_type = $4, required = $5, sort = $6,
                options = $7, default_value = $8, status = $9,
                updated_at = $10, updated_by = $11
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.label)
        .bind(record.element_type)
        .bind(record.required)
        .bind(record.sort)
        .bind(&record.options)
        .bind(&record.default_value)
        .bind(record.status)
        .bind(record.audit.updated_at)
        .bind(record.audit.updated_by)
        .execute(&mut **self.conn())
        .await
        .map_err(tx::classify)?;
        Ok(())
    }
}
