//! Record, payload and filter types for every resource family.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::Identity;

pub mod element;
pub mod meeting;
pub mod node;
pub mod team;
pub mod template;
pub mod upload;

pub use element::{Element, ElementFilter, ElementPatch, NewElement};
pub use meeting::{Meeting, MeetingFilter, MeetingPatch, NewMeeting};
pub use node::{NewNode, Node, NodeFilter, NodePatch};
pub use team::{NewTeam, Team, TeamFilter, TeamPatch};
pub use template::{NewTemplate, Template, TemplateFilter, TemplatePatch};
pub use upload::{NewUpload, Upload, UploadFilter};

/// Lifecycle status values. Anything `> 0` is active.
pub mod status {
    use crate::error::{Error, Result};

    pub const ENABLED: i32 = 1;
    pub const DISABLED: i32 = 2;
    pub const DELETED: i32 = -1;

    /// Status every record starts in.
    pub const INITIAL: i32 = ENABLED;

    pub fn is_active(status: i32) -> bool {
        status > 0
    }

    /// Statuses a caller may set through an update. Deletion has its own
    /// operation and is irreversible, so `DELETED` is never settable.
    pub fn validate_settable(status: i32) -> Result<()> {
        match status {
            ENABLED | DISABLED => Ok(()),
            other => Err(Error::InvalidInput(format!(
                "status must be {} (enabled) or {} (disabled), got {}",
                ENABLED, DISABLED, other
            ))),
        }
    }
}

/// Audit quad carried by every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: i64,
}

impl Audit {
    /// Audit for a freshly inserted record.
    pub fn created(stamp: &AuditStamp) -> Self {
        Self {
            created_at: stamp.at,
            created_by: stamp.by,
            updated_at: stamp.at,
            updated_by: stamp.by,
        }
    }

    /// Rewrite the updated pair; the created pair is immutable.
    pub fn touch(&mut self, stamp: &AuditStamp) {
        self.updated_at = stamp.at;
        self.updated_by = stamp.by;
    }
}

/// Who and when, stamped onto a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditStamp {
    pub at: DateTime<Utc>,
    pub by: i64,
}

impl AuditStamp {
    pub fn now(caller: &Identity) -> Self {
        Self {
            at: Utc::now(),
            by: caller.user_id,
        }
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn require_positive(field: &str, value: i32) -> Result<()> {
    if value < 1 {
        return Err(Error::InvalidInput(format!(
            "{} must be >= 1, got {}",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &str, value: i32) -> Result<()> {
    if value < 0 {
        return Err(Error::InvalidInput(format!(
            "{} must be >= 0, got {}",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn require_id(field: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

/// Case-insensitive substring match used by in-process filtering.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Treat an empty or whitespace-only string filter as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settable_status() {
        assert!(status::validate_settable(status::ENABLED).is_ok());
        assert!(status::validate_settable(status::DISABLED).is_ok());
        assert!(status::validate_settable(status::DELETED).is_err());
        assert!(status::validate_settable(0).is_err());
    }

    #[test]
    fn test_touch_keeps_created_pair() {
        let caller = Identity::new("a", 1, 5);
        let first = AuditStamp::now(&caller);
        let mut audit = Audit::created(&first);
        let later = AuditStamp {
            at: first.at + chrono::Duration::seconds(5),
            by: 2,
        };
        audit.touch(&later);
        assert_eq!(audit.created_at, first.at);
        assert_eq!(audit.created_by, 1);
        assert_eq!(audit.updated_at, later.at);
        assert_eq!(audit.updated_by, 2);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&None), None);
        assert_eq!(non_blank(&Some("  ".into())), None);
        assert_eq!(non_blank(&Some(" ab ".into())), Some("ab"));
    }
}
