//! Meetings. Only the creating user (or a super-tenant caller) may change
//! or delete a meeting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, require_text, status, Audit};
use crate::error::{Error, Result};
use crate::patch::Patch;
use crate::traits::{ListFilter, Mutable, Placement, Resource, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,
    pub organization_id: i64,
    /// Creator; gates update and delete.
    pub user_id: i64,
    pub name: String,
    pub topic: String,
    pub location: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMeeting {
    #[serde(default)]
    pub organization_id: i64,
    /// Always overwritten with the caller's user id.
    #[serde(skip)]
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub location: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub topic: Patch<String>,
    #[serde(default)]
    pub location: Patch<String>,
    #[serde(default)]
    pub start_at: Patch<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Patch<DateTime<Utc>>,
    #[serde(default)]
    pub status: Patch<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingFilter {
    pub name: Option<String>,
    pub user_id: Option<i64>,
    pub organization_id: Option<i64>,
}

impl MeetingFilter {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn matches(&self, m: &Meeting) -> bool {
        self.name().map_or(true, |v| super::contains_ci(&m.name, v))
            && self.user_id.map_or(true, |v| m.user_id == v)
    }
}

impl ListFilter for MeetingFilter {
    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }

    fn set_organization_id(&mut self, organization_id: Option<i64>) {
        self.organization_id = organization_id;
    }
}

fn check_window(start_at: &DateTime<Utc>, end_at: &DateTime<Utc>) -> Result<()> {
    if end_at < start_at {
        return Err(Error::InvalidInput(format!(
            "end_at ({}) is before start_at ({})",
            end_at, start_at
        )));
    }
    Ok(())
}

impl Resource for Meeting {
    type New = NewMeeting;
    type Filter = MeetingFilter;

    const KIND: &'static str = "meeting";
    const OWNER_GATED: bool = true;

    fn id(&self) -> i64 {
        self.id
    }

    fn status(&self) -> i32 {
        self.status
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn placement(&self) -> Placement {
        Placement::Organization(self.organization_id)
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::text("name", &self.name, self.placement())]
    }

    fn owner_id(&self) -> Option<i64> {
        Some(self.user_id)
    }

    fn validate_new(new: &NewMeeting) -> Result<()> {
        require_text("name", &new.name)?;
        check_window(&new.start_at, &new.end_at)
    }

    fn placement_of_new(new: &NewMeeting) -> Placement {
        Placement::Organization(new.organization_id)
    }

    fn unique_keys_of_new(new: &NewMeeting) -> Vec<UniqueKey> {
        vec![UniqueKey::text(
            "name",
            &new.name,
            Self::placement_of_new(new),
        )]
    }

    fn pin_organization(new: &mut NewMeeting, organization_id: i64) {
        new.organization_id = organization_id;
    }

    fn bind_owner(new: &mut NewMeeting, user_id: i64) {
        new.user_id = user_id;
    }
}

impl Mutable for Meeting {
    type Patch = MeetingPatch;

    fn validate_patch(patch: &MeetingPatch) -> Result<()> {
        if let Some(name) = patch.name.as_set() {
            require_text("name", name)?;
        }
        if let Some(s) = patch.status.as_set() {
            status::validate_settable(*s)?;
        }
        Ok(())
    }

    fn merge(&mut self, patch: MeetingPatch) {
        patch.name.apply_to(&mut self.name);
        patch.topic.apply_to(&mut self.topic);
        patch.location.apply_to(&mut self.location);
        patch.start_at.apply_to(&mut self.start_at);
        patch.end_at.apply_to(&mut self.end_at);
        patch.status.apply_to(&mut self.status);
    }

    fn validate_merged(&self) -> Result<()> {
        check_window(&self.start_at, &self.end_at)
    }
}
