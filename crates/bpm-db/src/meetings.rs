//! Meeting storage.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bpm_core::models::{status, AuditStamp, Meeting, MeetingFilter, NewMeeting};
use bpm_core::{EntityTx, Error, ListFilter, OrgScope, Page, PageRequest, PatchTx, Result, UniqueKey};

use crate::list_query::{fetch_optional, fetch_page, ListQueryBuilder, ReadShape};
use crate::tx::{self, PgTx};

pub(crate) const TABLE: &str = "bpm_meeting";

const SHAPE: ReadShape = ReadShape {
    table: TABLE,
    columns: "m.id, m.organization_id, m.user_id, m.name, m.topic, m.location, \
              m.start_at, m.end_at, m.status, \
              m.created_at, m.created_by, m.updated_at, m.updated_by",
    from: "bpm_meeting m",
    order_by: "m.id DESC",
};

fn map_row(row: &PgRow) -> Meeting {
    Meeting {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        topic: row.get("topic"),
        location: row.get("location"),
        start_at: row.get("start_at"),
        end_at: row.get("end_at"),
        status: row.get("status"),
        audit: tx::audit_from_row(row),
    }
}

/// Read path for meetings.
#[derive(Debug, Clone)]
pub struct PgMeetingRepository {
    pool: PgPool,
}

impl PgMeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64, scope: OrgScope) -> Result<Option<Meeting>> {
        let builder = ListQueryBuilder::new("m.status > 0")
            .eq_i64("m.id", Some(id))
            .eq_i64("m.organization_id", scope.tenant());
        fetch_optional(&self.pool, &SHAPE, &builder, map_row).await
    }

    pub async fn list(&self, filter: &MeetingFilter, page: &PageRequest) -> Result<Page<Meeting>> {
        let builder = ListQueryBuilder::new("m.status > 0")
            .eq_i64("m.organization_id", filter.organization_id())
            .contains("m.name", filter.name())
            .eq_i64("m.user_id", filter.user_id);
        fetch_page(&self.pool, &SHAPE, &builder, page, map_row).await
    }
}

#[async_trait]
impl EntityTx<Meeting> for PgTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<Meeting>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE m.id = $1 AND m.status > 0 FOR UPDATE",
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

    async fn insert(&mut self, new: &NewMeeting, stamp: &AuditStamp) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO bpm_meeting
                (organization_id, user_id, name, topic, location, start_at, end_at,
                 status, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $9, $10)
            RETURNING id
            "#,
        )
        .bind(new.organization_id)
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.topic)
        .bind(&new.location)
        .bind(new.start_at)
        .bind(new.end_at)
        .bind(status::INITIAL)
        .bind(stamp.at)
        .bind(stamp.by)
        .fetch_one(&mut **self.conn())
        .await
        .map_err(tx::classify)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        tx::mark_deleted(self, TABLE, "meeting", id, stamp).await
    }
}

#[async_trait]
impl PatchTx<Meeting> for PgTx {
    async fn persist(&mut self, record: &Meeting) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bpm_meeting
            SET name = $2, topic = $3, location = $4, start_at = $5, end_at = $6,
                status = $7, updated_at = $8, updated_by = $9
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.topic)
        .bind(&record.location)
        .bind(record.start_at)
        .bind(record.end_at)
        .bind(record.status)
        .bind(record.audit.updated_at)
        .bind(record.audit.updated_by)
        .execute(&mut **self.conn())
        .await
        .map_err(tx::classify)?;
        Ok(())
    }
}
