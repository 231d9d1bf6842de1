//! Team storage.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bpm_core::models::{status, AuditStamp, NewTeam, Team, TeamFilter};
use bpm_core::{EntityTx, Error, ListFilter, OrgScope, Page, PageRequest, PatchTx, Result, UniqueKey};

use crate::list_query::{fetch_optional, fetch_page, ListQueryBuilder, ReadShape};
use crate::tx::{self, PgTx};

pub(crate) const TABLE: &str = "bpm_team";

const SHAPE: ReadShape = ReadShape {
    table: TABLE,
    columns: "tm.id, tm.organization_id, tm.name, tm.leader, tm.phone, tm.description, \
              tm.status, tm.created_at, tm.created_by, tm.updated_at, tm.updated_by",
    from: "bpm_team tm",
    order_by: "tm.id DESC",
};

fn map_row(row: &PgRow) -> Team {
    Team {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        name: row.get("name"),
        leader: row.get("leader"),
        phone: row.get("phone"),
        description: row.get("description"),
        status: row.get("status"),
        audit: tx::audit_from_row(row),
    }
}

/// Read path for teams.
#[derive(Debug, Clone)]
pub struct PgTeamRepository {
    pool: PgPool,
}

impl PgTeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64, scope: OrgScope) -> Result<Option<Team>> {
        let builder = ListQueryBuilder::new("tm.status > 0")
            .eq_i64("tm.id", Some(id))
            .eq_i64("tm.organization_id", scope.tenant());
        fetch_optional(&self.pool, &SHAPE, &builder, map_row).await
    }

    pub async fn list(&self, filter: &TeamFilter, page: &PageRequest) -> Result<Page<Team>> {
        let builder = ListQueryBuilder::new("tm.status > 0")
            .eq_i64("tm.organization_id", filter.organization_id())
            .contains("tm.name", filter.name());
        fetch_page(&self.pool, &SHAPE, &builder, page, map_row).await
    }
}

#[async_trait]
impl EntityTx<Team> for PgTx {
    async fn load_for_update(&mut self, id: i64) -> Result<Option<Team>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE tm.id = $1 AND tm.status > 0 FOR UPDATE",
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

    async fn insert(&mut self, new: &NewTeam, stamp: &AuditStamp) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO bpm_team
                (organization_id, name, leader, phone, description,
                 status, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7, $8)
            RETURNING id
            "#,
        )
        .bind(new.organization_id)
        .bind(&new.name)
        .bind(&new.leader)
        .bind(&new.phone)
        .bind(&new.description)
        .bind(status::INITIAL)
        .bind(stamp.at)
        .bind(stamp.by)
        .fetch_one(&mut **self.conn())
        .await
        .map_err(tx::classify)
    }

    async fn mark_deleted(&mut self, id: i64, stamp: &AuditStamp) -> Result<()> {
        tx::mark_deleted(self, TABLE, "team", id, stamp).await
    }
}

#[async_trait]
impl PatchTx<Team> for PgTx {
    async fn persist(&mut self, record: &Team) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bpm_team
            SET name = $2, leader = $3, phone = $4, description = $5,
                status = $6, updated_at = $7, updated_by = $8
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.leader)
        .bind(&record.phone)
        .bind(&record.description)
        .bind(record.status)
        .bind(record.audit.updated_at)
        .bind(record.audit.updated_by)
        .execute(&mut **self.conn())
        .await
        .map_err(tx::classify)?;
        Ok(())
    }
}
