//! Upload metadata storage. Rows are immutable once written.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bpm_core::models::{status, AuditStamp, NewUpload, Upload, UploadFilter};
use bpm_core::{EntityTx, Error, ListFilter, OrgScope, Page, PageRequest, Result, UniqueKey};

use crate::list_query::{fetch_optional, fetch_page, ListQueryBuilder, ReadShape};
use crate::tx::{self, PgTx};

pub(crate) const TABLE: &str = "bpm_upload";

const SHAPE: ReadShape = ReadShape {
    table: TABLE,
    columns: "u.id, u.organization_id, u.user_id, u.file_name, u.content_type, u.size_bytes, \
              u.storage_key, u.status, u.created_at, u.created_by, u.updated_at, u.updated_by",
    from: "bpm_upload u",
    order_by: "u.id DESC",
};

fn map_row(row: &PgRow) -> Upload {
    Upload {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        user_id: row.get("user_id"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        storage_key: row.get("storage_key"),
        status: row.get("status"),
        audit: tx::audit_from_row(row),
    }
}

/// Read path for uploads.
#[derive(Debug, Clone)]
pub struct PgUploadRepository {
    pool: PgPool,
}

impl PgUploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64, scope: OrgScope) -> Result<Option<Upload>> {
        let builder = ListQueryBuilder::new("u.status > 0")
            .eq_i64("u.id", Some(id))
            .eq_i64("u.organization_id", scope.tenant());
        fetch_optional(&self.pool, &SHAPE, &builder, map_row).await
    }

    pub async fn list(&self, filter: &UploadFilter, page: &PageRequest) -> Result<Page<Upload>> {
        let builder = ListQueryBuilder::new("u.status > 0")
            .eq_i64("u.organization_id", filter.organization_id())
            .contains("u.file_name", filter.file_name())
            .contains("u.content_type", filter.content_type());
        fetch_page(&self.pool, &SHAPE, &builder, page, map_row).await
    }
}

#[async_trait]
impl EntityTx<Upload> for PgTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<Upload>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE u.id = $1 AND u.status > 0 FOR UPDATE",
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

    async fn insert(&mut self, new: &NewUpload, stamp: &AuditStamp) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO bpm_upload
                (organization_id, user_id, file_name, content_type, size_bytes, storage_key,
                 status, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $8, $9)
            RETURNING id
            "#,
        )
        .bind(new.organization_id)
        .bind(new.user_id)
        .bind(&new.file_name)
        .bind(&new.content_type)
        .bind(new.size_bytes)
        .bind(&new.storage_key)
        .bind(status::INITIAL)
        .bind(stamp.at)
        .bind(stamp.by)
        .fetch_one(&mut **self.conn())
        .await
        .map_err(tx::classify)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        tx::mark_deleted(self, TABLE, "upload", id, stamp).await
    }
}
