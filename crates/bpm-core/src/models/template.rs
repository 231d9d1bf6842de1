//! Templates: organization-owned process/form templates.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{non_blank, require_positive, require_text, status, Audit};
use crate::error::Result;
use crate::patch::Patch;
use crate::traits::{ListFilter, Mutable, Placement, Resource, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub template_type: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque payload, stored and returned as-is.
    pub event_json: JsonValue,
    pub status: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    #[serde(default)]
    pub organization_id: i64,
    pub name: String,
    pub template_type: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_json: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatePatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub template_type: Patch<i32>,
    #[serde(default)]
    pub description: Patch<Option<String>>,
    #[serde(default)]
    pub event_json: Patch<JsonValue>,
    #[serde(default)]
    pub status: Patch<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilter {
    pub name: Option<String>,
    pub template_type: Option<i32>,
    pub status: Option<i32>,
    pub organization_id: Option<i64>,
}

impl TemplateFilter {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn matches(&self, t: &Template) -> bool {
        self.name().map_or(true, |n| super::contains_ci(&t.name, n))
            && self.template_type.map_or(true, |v| t.template_type == v)
            && self.status.map_or(true, |v| t.status == v)
    }
}

impl ListFilter for TemplateFilter {
    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }

    fn set_organization_id(&mut self, organization_id: Option<i64>) {
        self.organization_id = organization_id;
    }
}

impl Resource for Template {
    type New = NewTemplate;
    type Filter = TemplateFilter;

    const KIND: &'static str = "template";

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

    fn validate_new(new: &NewTemplate) -> Result<()> {
        require_text("name", &new.name)?;
        require_positive("template_type", new.template_type)
    }

    fn placement_of_new(new: &NewTemplate) -> Placement {
        Placement::Organization(new.organization_id)
    }

    fn unique_keys_of_new(new: &NewTemplate) -> Vec<UniqueKey> {
        vec![UniqueKey::text(
            "name",
            &new.name,
            Self::placement_of_new(new),
        )]
    }

    fn pin_organization(new: &mut NewTemplate, organization_id: i64) {
        new.organization_id = organization_id;
    }
}

impl Mutable for Template {
    type Patch = TemplatePatch;

    fn validate_patch(patch: &TemplatePatch) -> Result<()> {
        if let Some(name) = patch.name.as_set() {
            require_text("name", name)?;
        }
        if let Some(t) = patch.template_type.as_set() {
            require_positive("template_type", *t)?;
        }
        if let Some(s) = patch.status.as_set() {
            status::validate_settable(*s)?;
        }
        Ok(())
    }

    fn merge(&mut self, patch: TemplatePatch) {
        patch.name.apply_to(&mut self.name);
        patch.template_type.apply_to(&mut self.template_type);
        patch.description.apply_to(&mut self.description);
        patch.event_json.apply_to(&mut self.event_json);
        patch.status.apply_to(&mut self.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditStamp;
    use crate::Identity;

    fn sample() -> Template {
        Template {
            id: 1,
            organization_id: 5,
            name: "T1".into(),
            template_type: 1,
            description: Some("leave request".into()),
            event_json: serde_json::json!({"steps": []}),
            status: status::ENABLED,
            audit: Audit::created(&AuditStamp::now(&Identity::new("a", 1, 5))),
        }
    }

    #[test]
    fn test_merge_only_touches_present_fields() {
        let mut t = sample();
        let patch: TemplatePatch = serde_json::from_str(r#"{"template_type": 3}"#).unwrap();
        t.merge(patch);
        assert_eq!(t.template_type, 3);
        assert_eq!(t.name, "T1");
        assert_eq!(t.description.as_deref(), Some("leave request"));
        assert_eq!(t.event_json, serde_json::json!({"steps": []}));
    }

    #[test]
    fn test_patch_cannot_soft_delete() {
        let patch: TemplatePatch = serde_json::from_str(r#"{"status": -1}"#).unwrap();
        assert!(Template::validate_patch(&patch).is_err());
    }

    #[test]
    fn test_new_requires_name_and_type() {
        let new: NewTemplate =
            serde_json::from_str(r#"{"name": " ", "template_type": 1}"#).unwrap();
        assert!(Template::validate_new(&new).is_err());
        let new: NewTemplate =
            serde_json::from_str(r#"{"name": "T1", "template_type": 0}"#).unwrap();
        assert!(Template::validate_new(&new).is_err());
    }

    #[test]
    fn test_filter_matches_substring_case_insensitively() {
        let filter = TemplateFilter {
            name: Some("t".into()),
            ..Default::default()
        };
        assert!(filter.matches(&sample()));
        let filter = TemplateFilter {
            template_type: Some(2),
            ..Default::default()
        };
        assert!(!filter.matches(&sample()));
    }

    #[test]
    fn test_serialized_record_flattens_audit() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("created_at").is_some());
        assert!(json.get("audit").is_none());
    }
}
