//! Predicate builder shared by the count and page queries of a list.
//!
//! Every optional filter that is present adds one AND clause with a
//! positional parameter; absent filters add nothing. The same clause list and
//! parameter vector drive both the `COUNT(*)` and the paged `SELECT`, so the
//! total always describes exactly the rows being paged.

use std::time::Instant;

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;

use bpm_core::{Error, Page, PageRequest, Result};

use crate::escape_like;

/// Type-safe parameter binding for list queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    BigInt(i64),
    Int(i32),
    String(String),
}

/// Builds the WHERE clause of a list query.
///
/// ```rust,ignore
/// let builder = ListQueryBuilder::new("t.status > 0")
///     .eq_i64("t.organization_id", Some(5))
///     .contains("t.name", Some("finance"));
/// let (where_sql, params) = builder.build();
/// // where_sql: "t.status > 0 AND t.organization_id = $1 AND t.name ILIKE '%' || $2 || '%' ESCAPE '\'"
/// ```
#[derive(Debug, Clone)]
pub struct ListQueryBuilder {
    clauses: Vec<String>,
    params: Vec<QueryParam>,
}

impl ListQueryBuilder {
    /// Start from a fixed clause, typically the active-status predicate.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            clauses: vec![base.into()],
            params: Vec::new(),
        }
    }

    fn push(mut self, clause: impl FnOnce(usize) -> String, param: QueryParam) -> Self {
        self.params.push(param);
        let idx = self.params.len();
        self.clauses.push(clause(idx));
        self
    }

    pub fn eq_i64(self, column: &str, value: Option<i64>) -> Self {
        match value {
            Some(v) => self.push(|i| format!("{} = ${}", column, i), QueryParam::BigInt(v)),
            None => self,
        }
    }

    pub fn eq_i32(self, column: &str, value: Option<i32>) -> Self {
        match value {
            Some(v) => self.push(|i| format!("{} = ${}", column, i), QueryParam::Int(v)),
            None => self,
        }
    }

    /// Case-insensitive substring match with LIKE wildcards escaped.
    pub fn contains(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.push(
                |i| format!("{} ILIKE '%' || ${} || '%' ESCAPE '\\'", column, i),
                QueryParam::String(escape_like(v)),
            ),
            None => self,
        }
    }

    /// Index of the next positional parameter after the filter parameters.
    pub fn next_param(&self) -> usize {
        self.params.len() + 1
    }

    pub fn build(&self) -> (String, &[QueryParam]) {
        (self.clauses.join(" AND "), &self.params)
    }
}

/// Bind list parameters in order.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::BigInt(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::String(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Shape of one family's read query.
pub(crate) struct ReadShape {
    pub table: &'static str,
    /// Selected columns, qualified by the row alias.
    pub columns: &'static str,
    /// FROM clause including any joins to the parent chain.
    pub from: &'static str,
    pub order_by: &'static str,
}

/// Run the count and page queries for one list request.
pub(crate) async fn fetch_page<R>(
    pool: &PgPool,
    shape: &ReadShape,
    builder: &ListQueryBuilder,
    page: &PageRequest,
    map: fn(&PgRow) -> R,
) -> Result<Page<R>> {
    let start = Instant::now();
    let (where_sql, params) = builder.build();
    let limit_param = builder.next_param();
    let offset_param = limit_param + 1;

    let count_sql = format!(
        "SELECT COUNT(*) AS count FROM {} WHERE {}",
        shape.from, where_sql
    );
    let rows_sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
        shape.columns, shape.from, where_sql, shape.order_by, limit_param, offset_param
    );

    let count_q = bind_params(sqlx::query(&count_sql), params);
    let rows_q = bind_params(sqlx::query(&rows_sql), params)
        .bind(page.limit())
        .bind(page.offset());

    let (count_row, rows) = futures::try_join!(count_q.fetch_one(pool), rows_q.fetch_all(pool))
        .map_err(Error::Database)?;
    let total: i64 = count_row.get("count");

    debug!(
        subsystem = "db",
        component = "list",
        op = "list",
        db_table = shape.table,
        result_count = total,
        duration_ms = start.elapsed().as_millis() as u64,
        "List query complete"
    );
    Ok(Page::new(page, total, rows.iter().map(map).collect()))
}

/// Fetch at most one row matching `builder`.
pub(crate) async fn fetch_optional<R>(
    pool: &PgPool,
    shape: &ReadShape,
    builder: &ListQueryBuilder,
    map: fn(&PgRow) -> R,
) -> Result<Option<R>> {
    let (where_sql, params) = builder.build();
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        shape.columns, shape.from, where_sql
    );
    let row = bind_params(sqlx::query(&sql), params)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)?;
    Ok(row.as_ref().map(map))
}
