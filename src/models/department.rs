//! Department records, local and remote

use serde::{Deserialize, Serialize};

/// A department as described by one row of `departments.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    /// Stable local key, stored remotely as `externalId`
    pub external_id: String,
    pub name: String,
    /// `None` for a top-level department
    pub parent_external_id: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
}

/// A department as returned by the directory API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDepartment {
    pub id: u64,

    pub name: String,

    #[serde(default)]
    pub parent_id: Option<u64>,

    #[serde(default)]
    pub external_id: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl RemoteDepartment {
    /// The external id, treating an empty string as unset
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Fold a successful patch into this cached copy.
    pub fn apply(&mut self, patch: &DepartmentPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = Some(parent_id);
        }
        if let Some(label) = &patch.label {
            self.label = Some(label.clone());
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(external_id) = &patch.external_id {
            self.external_id = Some(external_id.clone());
        }
    }
}

/// Body of a department create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    pub name: String,
    pub parent_id: u64,
    pub external_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update of a department; only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl DepartmentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
