//! Server configuration read from the environment at start-up.
//!
//! | Variable                  | Default              |
//! |---------------------------|----------------------|
//! | `DATABASE_URL`            | required             |
//! | `HOST`                    | `0.0.0.0`            |
//! | `PORT`                    | `3000`               |
//! | `JWT_SECRET`              | required, >= 16 bytes |
//! | `DB_MAX_CONNECTIONS`      | `10`                 |
//! | `DB_CONNECT_TIMEOUT_SECS` | `30`                 |
//! | `RUN_MIGRATIONS`          | `true`               |
//! | `ALLOWED_ORIGINS`         | `http://localhost:3000` |
//!
//! Log variables are read separately by [`crate::logging`].

use std::net::SocketAddr;
use std::time::Duration;

use bpm_db::PoolSettings;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
pub const MIN_JWT_SECRET_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub db_connect_timeout: Duration,
    pub run_migrations: bool,
    pub allowed_origins: Vec<String>,
}

// Keep secrets out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_connect_timeout", &self.db_connect_timeout)
            .field("run_migrations", &self.run_migrations)
            .field("allowed_origins", &self.allowed_origins)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                value: "<redacted>".to_string(),
                reason: format!(
                    "must be at least {} bytes, got {}",
                    MIN_JWT_SECRET_LEN,
                    jwt_secret.len()
                ),
            });
        }

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let db_max_connections = parse_or(
            "DB_MAX_CONNECTIONS",
            get("DB_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let connect_timeout_secs = parse_or(
            "DB_CONNECT_TIMEOUT_SECS",
            get("DB_CONNECT_TIMEOUT_SECS"),
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;
        let run_migrations = match get("RUN_MIGRATIONS") {
            None => true,
            Some(v) => parse_bool("RUN_MIGRATIONS", &v)?,
        };

        let allowed_origins = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            database_url,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            jwt_secret,
            db_max_connections,
            db_connect_timeout: Duration::from_secs(connect_timeout_secs),
            run_migrations,
            allowed_origins,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            name: "HOST",
            value: self.host.clone(),
            reason: e.to_string(),
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings::new(self.db_max_connections, self.db_connect_timeout)
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: v.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/bpm"),
        ("JWT_SECRET", "0123456789abcdef"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.db_max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.db_connect_timeout, Duration::from_secs(30));
        assert!(config.run_migrations);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_missing_database_url() {
        let err = ServerConfig::from_lookup(lookup(&[("JWT_SECRET", "0123456789abcdef")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/bpm"),
            ("JWT_SECRET", "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected_without_echoing_it() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/bpm"),
            ("JWT_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "JWT_SECRET", .. }));
        assert!(!err.to_string().contains("short"));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("DB_MAX_CONNECTIONS", "0"));
        assert!(ServerConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("DB_CONNECT_TIMEOUT_SECS", "5"),
            ("RUN_MIGRATIONS", "false"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ]);
        let config = ServerConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.db_max_connections, 4);
        assert_eq!(config.db_connect_timeout, Duration::from_secs(5));
        assert!(!config.run_migrations);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(
            config.pool_settings(),
            PoolSettings::new(4, Duration::from_secs(5))
        );
    }

    #[test]
    fn test_bad_migration_flag() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("RUN_MIGRATIONS", "sometimes"));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { name: "RUN_MIGRATIONS", .. })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(!rendered.contains("postgres://"));
    }
}
