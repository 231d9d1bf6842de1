//! Upload records. The bytes live in external storage; this is the metadata
//! row pointing at them. Uploads are create/read only.

use serde::{Deserialize, Serialize};

use super::{non_blank, require_text, Audit};
use crate::error::{Error, Result};
use crate::traits::{ListFilter, Placement, Resource, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: i64,
    pub organization_id: i64,
    /// Uploading user.
    pub user_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Key of the object in external storage.
    pub storage_key: String,
    pub status: i32,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUpload {
    #[serde(default)]
    pub organization_id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadFilter {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub organization_id: Option<i64>,
}

impl UploadFilter {
    pub fn file_name(&self) -> Option<&str> {
        non_blank(&self.file_name)
    }

    pub fn content_type(&self) -> Option<&str> {
        non_blank(&self.content_type)
    }

    pub fn matches(&self, u: &Upload) -> bool {
        self.file_name()
            .map_or(true, |v| super::contains_ci(&u.file_name, v))
            && self
                .content_type()
                .map_or(true, |v| super::contains_ci(&u.content_type, v))
    }
}

impl ListFilter for UploadFilter {
    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }

    fn set_organization_id(&mut self, organization_id: Option<i64>) {
        self.organization_id = organization_id;
    }
}

impl Resource for Upload {
    type New = NewUpload;
    type Filter = UploadFilter;

    const KIND: &'static str = "upload";

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
        Vec::new()
    }

    fn owner_id(&self) -> Option<i64> {
        Some(self.user_id)
    }

    fn validate_new(new: &NewUpload) -> Result<()> {
        require_text("file_name", &new.file_name)?;
        require_text("storage_key", &new.storage_key)?;
        if new.size_bytes < 0 {
            return Err(Error::InvalidInput(format!(
                "size_bytes must be >= 0, got {}",
                new.size_bytes
            )));
        }
        Ok(())
    }

    fn placement_of_new(new: &NewUpload) -> Placement {
        Placement::Organization(new.organization_id)
    }

    fn unique_keys_of_new(_new: &NewUpload) -> Vec<UniqueKey> {
        Vec::new()
    }

    fn pin_organization(new: &mut NewUpload, organization_id: i64) {
        new.organization_id = organization_id;
    }

    fn bind_owner(new: &mut NewUpload, user_id: i64) {
        new.user_id = user_id;
    }
}
