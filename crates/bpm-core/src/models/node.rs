//! Nodes: steps of a template. Scoped through their template.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{non_blank, require_id, require_non_negative, require_positive, require_text, status, Audit};
use crate::error::Result;
use crate::patch::Patch;
use crate::traits::{ListFilter, ListOrder, Mutable, ParentRef, Placement, Resource, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub template_id: i64,
    pub name: String,
    pub node_type: i32,
    pub sort: i32,
    pub event_json: JsonValue,
    pub status: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNode {
    pub template_id: i64,
    pub name: String,
    pub node_type: i32,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub event_json: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub node_type: Patch<i32>,
    #[serde(default)]
    pub sort: Patch<i32>,
    #[serde(default)]
    pub event_json: Patch<JsonValue>,
    #[serde(default)]
    pub status: Patch<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeFilter {
    pub template_id: Option<i64>,
    pub name: Option<String>,
    pub organization_id: Option<i64>,
}

impl NodeFilter {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn matches(&self, n: &Node) -> bool {
        self.template_id.map_or(true, |v| n.template_id == v)
            && self.name().map_or(true, |v| super::contains_ci(&n.name, v))
    }
}

impl ListFilter for NodeFilter {
    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }

    fn set_organization_id(&mut self, organization_id: Option<i64>) {
        self.organization_id = organization_id;
    }
}

impl Resource for Node {
    type New = NewNode;
    type Filter = NodeFilter;

    const KIND: &'static str = "node";
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
        Placement::Parent(ParentRef::template(self.template_id))
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::text("name", &self.name, self.placement())]
    }

    fn sort(&self) -> i32 {
        self.sort
    }

    fn validate_new(new: &NewNode) -> Result<()> {
        require_id("template_id", new.template_id)?;
        require_text("name", &new.name)?;
        require_positive("node_type", new.node_type)?;
        require_non_negative("sort", new.sort)
    }

    fn placement_of_new(new: &NewNode) -> Placement {
        Placement::Parent(ParentRef::template(new.template_id))
    }

    fn unique_keys_of_new(new: &NewNode) -> Vec<UniqueKey> {
        vec![UniqueKey::text(
            "name",
            &new.name,
            Self::placement_of_new(new),
        )]
    }
}

impl Mutable for Node {
    type Patch = NodePatch;

    fn validate_patch(patch: &NodePatch) -> Result<()> {
        if let Some(name) = patch.name.as_set() {
            require_text("name", name)?;
        }
        if let Some(t) = patch.node_type.as_set() {
            require_positive("node_type", *t)?;
        }
        if let Some(sort) = patch.sort.as_set() {
            require_non_negative("sort", *sort)?;
        }
        if let Some(s) = patch.status.as_set() {
            status::validate_settable(*s)?;
        }
        Ok(())
    }

    fn merge(&mut self, patch: NodePatch) {
        patch.name.apply_to(&mut self.name);
        patch.node_type.apply_to(&mut self.node_type);
        patch.sort.apply_to(&mut self.sort);
        patch.event_json.apply_to(&mut self.event_json);
        patch.status.apply_to(&mut self.status);
    }
}
