//! Form elements: fields attached to a template node.
//!
//! `name` and `sort` are each unique among the active elements of a node.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{non_blank, require_id, require_non_negative, require_positive, require_text, status, Audit};
use crate::error::Result;
use crate::patch::Patch;
use crate::traits::{ListFilter, ListOrder, Mutable, ParentRef, Placement, Resource, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: i64,
    pub node_id: i64,
    pub name: String,
    pub label: String,
    pub element_type: i32,
    pub required: bool,
    pub sort: i32,
    /// Opaque option list/config for the element.
    pub options: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub status: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewElement {
    pub node_id: i64,
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub element_type: i32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub options: JsonValue,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub label: Patch<String>,
    #[serde(default)]
    pub element_type: Patch<i32>,
    #[serde(default)]
    pub required: Patch<bool>,
    #[serde(default)]
    pub sort: Patch<i32>,
    #[serde(default)]
    pub options: Patch<JsonValue>,
    #[serde(default)]
    pub default_value: Patch<Option<String>>,
    #[serde(default)]
    pub status: Patch<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementFilter {
    pub node_id: Option<i64>,
    pub name: Option<String>,
    pub element_type: Option<i32>,
    pub organization_id: Option<i64>,
}

impl ElementFilter {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn matches(&self, e: &Element) -> bool {
        self.node_id.map_or(true, |v| e.node_id == v)
            && self.name().map_or(true, |v| super::contains_ci(&e.name, v))
            && self.element_type.map_or(true, |v| e.element_type == v)
    }
}

impl ListFilter for ElementFilter {
    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }

    fn set_organization_id(&mut self, organization_id: Option<i64>) {
        self.organization_id = organization_id;
    }
}

impl Resource for Element {
    type New = NewElement;
    type Filter = ElementFilter;

    const KIND: &'static str = "element";
    const LIST_ORDER: ListOrder = ListOrder::BySort;

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
        Placement::Parent(ParentRef::node(self.node_id))
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let within = self.placement();
        vec![
            UniqueKey::text("name", &self.name, within),
            UniqueKey::int("sort", i64::from(self.sort), within),
        ]
    }

    fn sort(&self) -> i32 {
        self.sort
    }

    fn validate_new(new: &NewElement) -> Result<()> {
        require_id("node_id", new.node_id)?;
        require_text("name", &new.name)?;
        require_positive("element_type", new.element_type)?;
        require_non_negative("sort", new.sort)
    }

    fn placement_of_new(new: &NewElement) -> Placement {
        Placement::Parent(ParentRef::node(new.node_id))
    }

    fn unique_keys_of_new(new: &NewElement) -> Vec<UniqueKey> {
        let within = Self::placement_of_new(new);
        vec![
            UniqueKey::text("name", &new.name, within),
            UniqueKey::int("sort", i64::from(new.sort), within),
        ]
    }
}

impl Mutable for Element {
    type Patch = ElementPatch;

    fn validate_patch(patch: &ElementPatch) -> Result<()> {
        if let Some(name) = patch.name.as_set() {
            require_text("name", name)?;
        }
        if let Some(t) = patch.element_type.as_set() {
            require_positive("element_type", *t)?;
        }
        if let Some(sort) = patch.sort.as_set() {
            require_non_negative("sort", *sort)?;
        }
        if let Some(s) = patch.status.as_set() {
            status::validate_settable(*s)?;
        }
        Ok(())
    }

    fn merge(&mut self, patch: ElementPatch) {
        patch.name.apply_to(&mut self.name);
        patch.label.apply_to(&mut self.label);
        patch.element_type.apply_to(&mut self.element_type);
        patch.required.apply_to(&mut self.required);
        patch.sort.apply_to(&mut self.sort);
        patch.options.apply_to(&mut self.options);
        patch.default_value.apply_to(&mut self.default_value);
        patch.status.apply_to(&mut self.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditStamp;
    use crate::Identity;

    fn sample() -> Element {
        Element {
            id: 9,
            node_id: 4,
            name: "amount".into(),
            label: "Amount".into(),
            element_type: 2,
            required: true,
            sort: 3,
            options: JsonValue::Null,
            default_value: Some("0".into()),
            status: status::ENABLED,
            audit: Audit::created(&AuditStamp::now(&Identity::new("a", 1, 5))),
        }
    }

    #[test]
    fn test_element_declares_name_and_sort_keys() {
        let keys = sample().unique_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, "name");
        assert_eq!(keys[1].field, "sort");
        assert!(keys
            .iter()
            .all(|k| k.within == Placement::Parent(ParentRef::node(4))));
    }

    #[test]
    fn test_required_and_sort_can_be_reset_to_zero() {
        let mut e = sample();
        let patch: ElementPatch =
            serde_json::from_str(r#"{"required": false, "sort": 0}"#).unwrap();
        e.merge(patch);
        assert!(!e.required);
        assert_eq!(e.sort, 0);
        assert_eq!(e.name, "amount");
    }

    #[test]
    fn test_default_value_can_be_cleared() {
        let mut e = sample();
        let patch: ElementPatch = serde_json::from_str(r#"{"default_value": null}"#).unwrap();
        e.merge(patch);
        assert_eq!(e.default_value, None);
    }

    #[test]
    fn test_negative_sort_rejected() {
        let patch: ElementPatch = serde_json::from_str(r#"{"sort": -2}"#).unwrap();
        assert!(Element::validate_patch(&patch).is_err());
    }
}
