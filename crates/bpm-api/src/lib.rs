//! # bpm-api
//!
//! HTTP surface for bpm-admin: configuration, tracing set-up, bearer-token
//! authentication, the service facade and the axum router.
//!
//! The router is generic over the store so tests can drive it in-process
//! against [`bpm_core::MemoryStore`] while the binary serves PostgreSQL.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::{Caller, Claims, JwtVerifier, SharedResolver};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::build_router;
pub use services::AdminService;
pub use state::AppState;
