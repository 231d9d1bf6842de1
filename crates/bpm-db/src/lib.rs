//! # bpm-db
//!
//! PostgreSQL storage layer for bpm-admin.
//!
//! This crate provides:
//! - Connection pool management
//! - The transaction handle ([`PgTx`]) the validation core runs mutations on
//! - Per-family repositories for the read path
//! - The shared list predicate builder
//!
//! ## Example
//!
//! ```rust,ignore
//! use bpm_core::{validation, Identity, NewTeam, Team};
//! use bpm_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/bpm").await?;
//!     let caller = Identity::new("alice", 10, 5);
//!     let new: NewTeam = serde_json::from_str(r#"{"name": "Finance"}"#)?;
//!     let team: Team = validation::create::<Team, _>(&db, new, &caller).await?;
//!     println!("Created team: {}", team.id);
//!     Ok(())
//! }
//! ```

pub mod elements;
pub mod list_query;
pub mod meetings;
pub mod nodes;
pub mod pool;
pub mod teams;
pub mod templates;
pub mod tx;
pub mod uploads;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use async_trait::async_trait;

// Re-export core types
pub use bpm_core::*;

pub use elements::PgElementRepository;
pub use list_query::{ListQueryBuilder, QueryParam};
pub use meetings::PgMeetingRepository;
pub use nodes::PgNodeRepository;
pub use pool::{PoolSettings, PoolStats};
pub use teams::PgTeamRepository;
pub use templates::PgTemplateRepository;
pub use tx::PgTx;
pub use uploads::PgUploadRepository;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Database context: the pool plus one read repository per family.
///
/// Cloning is cheap; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub templates: PgTemplateRepository,
    pub nodes: PgNodeRepository,
    pub elements: PgElementRepository,
    pub teams: PgTeamRepository,
    pub meetings: PgMeetingRepository,
    pub uploads: PgUploadRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            templates: PgTemplateRepository::new(pool.clone()),
            nodes: PgNodeRepository::new(pool.clone()),
            elements: PgElementRepository::new(pool.clone()),
            teams: PgTeamRepository::new(pool.clone()),
            meetings: PgMeetingRepository::new(pool.clone()),
            uploads: PgUploadRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, PoolSettings::default()).await
    }

    pub async fn connect_with(url: &str, settings: PoolSettings) -> Result<Self> {
        let pool = pool::open(url, settings).await?;
        Ok(Self::new(pool))
    }

    /// Connect to test database (for integration tests).
    #[cfg(test)]
    pub async fn connect_test() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::test_fixtures::DEFAULT_TEST_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats::of(&self.pool)
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TxSource for Database {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        let inner = self.pool.begin().await.map_err(Error::Database)?;
        Ok(PgTx::new(inner))
    }

    async fn ping(&self) -> Result<()> {
        pool::ping(&self.pool).await
    }
}

/// Delegate a family's read path to its repository.
macro_rules! entity_query {
    ($resource:ty, $repo:ident) => {
        #[async_trait]
        impl EntityQuery<$resource> for Database {
            async fn find(&self, id: i64, scope: OrgScope) -> Result<Option<$resource>> {
                self.$repo.get(id, scope).await
            }

            async fn list(
                &self,
                filter: &<$resource as Resource>::Filter,
                page: &PageRequest,
            ) -> Result<Page<$resource>> {
                self.$repo.list(filter, page).await
            }
        }
    };
}

entity_query!(Template, templates);
entity_query!(Node, nodes);
entity_query!(Element, elements);
entity_query!(Team, teams);
entity_query!(Meeting, meetings);
entity_query!(Upload, uploads);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\tmp"), "c:\\\\tmp");
    }
}
