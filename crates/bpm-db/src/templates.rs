//! Template storage.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bpm_core::models::{status, AuditStamp, NewTemplate, Template, TemplateFilter};
use bpm_core::{EntityTx, Error, ListFilter, OrgScope, Page, PageRequest, PatchTx, Result, UniqueKey};

use crate::list_query::{fetch_optional, fetch_page, ListQueryBuilder, ReadShape};
use crate::tx::{self, PgTx};

pub(crate) const TABLE: &str = "bpm_template";

const SHAPE: ReadShape = ReadShape {
    table: TABLE,
    columns: "t.id, t.organization_id, t.name, t.template_type, t.description, t.event_json, \
              t.status, t.created_at, t.created_by, t.updated_at, t.updated_by",
    from: "bpm_template t",
    order_by: "t.id DESC",
};

fn map_row(row: &PgRow) -> Template {
    Template {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        name: row.get("name"),
        template_type: row.get("template_type"),
        description: row.get("description"),
        event_json: row.get("event_json"),
        status: row.get("status"),
        audit: tx::audit_from_row(row),
    }
}

/// Read path for templates.
#[derive(Debug, Clone)]
pub struct PgTemplateRepository {
    pool: PgPool,
}

impl PgTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64, scope: OrgScope) -> Result<Option<Template>> {
        let builder = ListQueryBuilder::new("t.status > 0")
            .eq_i64("t.id", Some(id))
            .eq_i64("t.organization_id", scope.tenant());
        fetch_optional(&self.pool, &SHAPE, &builder, map_row).await
    }

    pub async fn list(&self, filter: &TemplateFilter, page: &PageRequest) -> Result<Page<Template>> {
        let builder = ListQueryBuilder::new("t.status > 0")
            .eq_i64("t.organization_id", filter.organization_id())
            .contains("t.name", filter.name())
            .eq_i32("t.template_type", filter.template_type)
            .eq_i32("t.status", filter.status);
        fetch_page(&self.pool, &SHAPE, &builder, page, map_row).await
    }
}

#[async_trait]
impl EntityTx<Template> for PgTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<Template>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE t.id = $1 AND t.status > 0 FOR UPDATE",
            SHAPE.columns, SHAPE.from
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

    async fn insert(&mut self, new: &NewTemplate, stamp: &AuditStamp) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO bpm_template
                (organization_id, name, template_type, description, event_json,
                 status, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7, $8)
            RETURNING id
            "#,
        )
        .bind(new.organization_id)
        .bind(&new.name)
        .bind(new.template_type)
        .bind(&new.description)
        .bind(&new.event_json)
        .bind(status::INITIAL)
        .bind(stamp.at)
        .bind(stamp.by)
        .fetch_one(&mut **self.conn())
        .await
        .map_err(tx::classify)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        tx::mark_deleted(self, TABLE, "template", id, stamp).await
    }
}

#[async_trait]
impl PatchTx<Template> for PgTx {
    async fn persist(&mut self, record: &Template) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bpm_template
            SET name = $2, template_type = $3, description = $4, event_json = $5,
                status = $6, updated_at = $7, updated_by = $8
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.template_type)
        .bind(&record.description)
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
