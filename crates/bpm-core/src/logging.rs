//! Structured logging schema and field name constants for bpm-admin.
//!
//! Every crate logs with these field names so log aggregation can query one
//! schema across the api, core and db subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Storage fault or startup failure, requires operator attention |
//! | WARN  | Rejected mutation (rolled back), recoverable issue |
//! | INFO  | Lifecycle events (startup, shutdown), committed mutations |
//! | DEBUG | Decision points, query shapes, config choices |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID of the HTTP request. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "core", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "mutations", "admin_service", "pool", "auth"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create", "update", "delete", "get", "list"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Resource family ("template", "node", "element", ...).
pub const RESOURCE: &str = "resource";

/// Record id being operated on.
pub const RECORD_ID: &str = "record_id";

/// Caller's user id.
pub const USER_ID: &str = "user_id";

/// Caller's organization id (`0` for the super-tenant).
pub const ORGANIZATION_ID: &str = "organization_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Total matching rows of a list query.
pub const RESULT_COUNT: &str = "result_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error kind of a rejected or failed operation (see `Error::kind`).
pub const ERROR_KIND: &str = "error_kind";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_unique_snake_case() {
        let fields = [
            REQUEST_ID,
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            RESOURCE,
            RECORD_ID,
            USER_ID,
            ORGANIZATION_ID,
            DURATION_MS,
            RESULT_COUNT,
            POOL_SIZE,
            POOL_IDLE,
            DB_TABLE,
            ERROR_KIND,
            ERROR_MSG,
        ];
        let mut sorted = fields.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), fields.len());
        for field in fields {
            assert!(field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
