//! Connection pool setup and health.
//!
//! The admin server configures two things about its pool: how many
//! connections it may hold (`DB_MAX_CONNECTIONS`) and how long a request
//! waits to check one out (`DB_CONNECT_TIMEOUT_SECS`). Everything else stays
//! at the sqlx defaults.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use bpm_core::{Error, Result};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool limits taken from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long `begin` waits for a free connection before failing the
    /// mutation with a storage error.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl PoolSettings {
    pub fn new(max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            max_connections: max_connections.max(1),
            acquire_timeout,
        }
    }
}

/// Point-in-time occupancy of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub max_connections: u32,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
            max_connections: pool.options().get_max_connections(),
        }
    }

    /// Every permitted connection is open and checked out, so the next
    /// `begin` has to wait up to the acquire timeout.
    pub fn saturated(&self) -> bool {
        self.idle == 0 && self.size >= self.max_connections
    }

    /// Emit the occupancy at debug level, warning when saturated.
    pub fn log(&self) {
        debug!(
            subsystem = "db",
            component = "pool",
            op = "stats",
            pool_size = self.size,
            pool_idle = self.idle,
            max_connections = self.max_connections,
            "Pool occupancy"
        );
        if self.saturated() {
            warn!(
                subsystem = "db",
                component = "pool",
                pool_size = self.size,
                "All pool connections in use; mutations will queue for a connection"
            );
        }
    }
}

/// Open a pool against `database_url`. Fails fast when the first
/// connection cannot be made.
pub async fn open(database_url: &str, settings: PoolSettings) -> Result<PgPool> {
    let start = Instant::now();
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "open",
        max_connections = settings.max_connections,
        acquire_timeout_secs = settings.acquire_timeout.as_secs(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Round-trip a trivial query; backs the health endpoint.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(Error::Database)?;
    PoolStats::of(pool).log();
    Ok(())
}
