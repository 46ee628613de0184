//! Field-level comparison of local records against remote state

use crate::models::{Department, DepartmentPatch, RemoteDepartment, RemoteUser, User, UserName, UserPatch};

/// Where a dependency lives remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRef {
    Id(u64),
    /// Would be created by this run; only produced in dry-run mode
    Planned,
}

impl RemoteRef {
    fn matches(self, remote: Option<u64>) -> bool {
        match self {
            RemoteRef::Id(id) => remote == Some(id),
            RemoteRef::Planned => false,
        }
    }

    fn id(self) -> Option<u64> {
        match self {
            RemoteRef::Id(id) => Some(id),
            RemoteRef::Planned => None,
        }
    }
}

/// The patch to send plus the names of the fields it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes<P> {
    pub patch: P,
    pub fields: Vec<&'static str>,
}

impl<P> Changes<P> {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Optional CSV columns are only managed when the CSV gives a value.
fn managed_differs(local: Option<&str>, remote: Option<&str>) -> bool {
    local.is_some_and(|value| remote.unwrap_or_default() != value)
}

pub fn department_changes(
    local: &Department,
    parent: RemoteRef,
    remote: &RemoteDepartment,
) -> Changes<DepartmentPatch> {
    let mut changes = Changes::<DepartmentPatch>::default();

    if remote.name != local.name {
        changes.patch.name = Some(local.name.clone());
        changes.fields.push("name");
    }
    if !parent.matches(remote.parent_id) {
        changes.patch.parent_id = parent.id();
        changes.fields.push("parent");
    }
    if managed_differs(local.label.as_deref(), remote.label.as_deref()) {
        changes.patch.label = local.label.clone();
        changes.fields.push("label");
    }
    if managed_differs(local.description.as_deref(), remote.description.as_deref()) {
        changes.patch.description = local.description.clone();
        changes.fields.push("description");
    }

    changes
}

/// Passwords are never compared; they are only sent on create.
pub fn user_changes(local: &User, department: RemoteRef, remote: &RemoteUser) -> Changes<UserPatch> {
    let mut changes = Changes::<UserPatch>::default();

    if remote.name.first != local.first {
        changes.fields.push("first");
    }
    if remote.name.last != local.last {
        changes.fields.push("last");
    }
    if managed_differs(local.middle.as_deref(), Some(remote.name.middle.as_str())) {
        changes.fields.push("middle");
    }
    if !changes.is_empty() {
        // The directory replaces the name as a whole.
        changes.patch.name = Some(UserName {
            first: local.first.clone(),
            last: local.last.clone(),
            middle: local.middle.clone().unwrap_or_else(|| remote.name.middle.clone()),
        });
    }

    if managed_differs(local.position.as_deref(), remote.position.as_deref()) {
        changes.patch.position = local.position.clone();
        changes.fields.push("position");
    }
    if !department.matches(remote.department_id) {
        changes.patch.department_id = department.id();
        changes.fields.push("department");
    }
    if remote.language.as_deref() != Some(local.language.as_str()) {
        changes.patch.language = Some(local.language.clone());
        changes.fields.push("language");
    }
    if remote.timezone.as_deref() != Some(local.timezone.as_str()) {
        changes.patch.timezone = Some(local.timezone.clone());
        changes.fields.push("timezone");
    }

    changes
}
