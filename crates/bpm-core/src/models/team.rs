//! Teams within an organization.

use serde::{Deserialize, Serialize};

use super::{non_blank, require_text, status, Audit};
use crate::error::Result;
use crate::patch::Patch;
use crate::traits::{ListFilter, Mutable, Placement, Resource, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub leader: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    #[serde(default)]
    pub organization_id: i64,
    pub name: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub leader: Patch<String>,
    #[serde(default)]
    pub phone: Patch<String>,
    #[serde(default)]
    pub description: Patch<Option<String>>,
    #[serde(default)]
    pub status: Patch<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamFilter {
    pub name: Option<String>,
    pub organization_id: Option<i64>,
}

impl TeamFilter {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn matches(&self, t: &Team) -> bool {
        self.name().map_or(true, |v| super::contains_ci(&t.name, v))
    }
}

impl ListFilter for TeamFilter {
    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }

    fn set_organization_id(&mut self, organization_id: Option<i64>) {
        self.organization_id = organization_id;
    }
}

impl Resource for Team {
    type New = NewTeam;
    type Filter = TeamFilter;

    const KIND: &'static str = "team";

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

    fn validate_new(new: &NewTeam) -> Result<()> {
        require_text("name", &new.name)
    }

    fn placement_of_new(new: &NewTeam) -> Placement {
        Placement::Organization(new.organization_id)
    }

    fn unique_keys_of_new(new: &NewTeam) -> Vec<UniqueKey> {
        vec![UniqueKey::text(
            "name",
            &new.name,
            Self::placement_of_new(new),
        )]
    }

    fn pin_organization(new: &mut NewTeam, organization_id: i64) {
        new.organization_id = organization_id;
    }
}

impl Mutable for Team {
    type Patch = TeamPatch;

    fn validate_patch(patch: &TeamPatch) -> Result<()> {
        if let Some(name) = patch.name.as_set() {
            require_text("name", name)?;
        }
        if let Some(s) = patch.status.as_set() {
            status::validate_settable(*s)?;
        }
        Ok(())
    }

    fn merge(&mut self, patch: TeamPatch) {
        patch.name.apply_to(&mut self.name);
        patch.leader.apply_to(&mut self.leader);
        patch.phone.apply_to(&mut self.phone);
        patch.description.apply_to(&mut self.description);
        patch.status.apply_to(&mut self.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditStamp;
    use crate::Identity;

    #[test]
    fn test_merge_leader_only() {
        let mut team = Team {
            id: 1,
            organization_id: 5,
            name: "A".into(),
            leader: "X".into(),
            phone: "1".into(),
            description: None,
            status: status::ENABLED,
            audit: Audit::created(&AuditStamp::now(&Identity::new("a", 1, 5))),
        };
        let patch: TeamPatch = serde_json::from_str(r#"{"leader": "Y"}"#).unwrap();
        team.merge(patch);
        assert_eq!(team.name, "A");
        assert_eq!(team.leader, "Y");
        assert_eq!(team.phone, "1");
    }

    #[test]
    fn test_empty_name_in_patch_rejected() {
        let patch: TeamPatch = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(Team::validate_patch(&patch).is_err());
    }
}
