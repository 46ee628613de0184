//! The directory operations the reconciler depends on

use tracing::debug;

use super::DirectoryClient;
use super::error::ApiResult;
use crate::models::{
    DepartmentPatch, NewDepartment, NewUser, RemoteDepartment, RemoteUser, UserPatch,
};

/// Lookup and mutation operations against a remote directory.
///
/// Calls are issued strictly one at a time, so implementations may keep
/// mutable state (caches, call logs) without synchronization.
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Department carrying `external_id`, if any
    async fn find_department(&mut self, external_id: &str) -> ApiResult<Option<RemoteDepartment>>;

    /// Departments named `name` that have no external id yet, in listing order
    async fn find_unclaimed_departments(&mut self, name: &str) -> ApiResult<Vec<RemoteDepartment>>;

    async fn create_department(&mut self, department: &NewDepartment) -> ApiResult<RemoteDepartment>;

    async fn update_department(&mut self, id: u64, patch: &DepartmentPatch) -> ApiResult<()>;

    async fn find_user(&mut self, nickname: &str) -> ApiResult<Option<RemoteUser>>;

    async fn create_user(&mut self, user: &NewUser) -> ApiResult<RemoteUser>;

    async fn update_user(&mut self, id: &str, patch: &UserPatch) -> ApiResult<()>;

    /// Drop any cached remote state so the next lookup re-reads it
    fn invalidate(&mut self);
}

impl DirectoryClient {
    async fn department_cache(&mut self) -> ApiResult<&mut Vec<RemoteDepartment>> {
        if self.departments.is_none() {
            let listed = self.list_departments().await?;
            self.departments = Some(listed);
        }
        Ok(self.departments.get_or_insert_with(Vec::new))
    }

    async fn user_cache(&mut self) -> ApiResult<&mut Vec<RemoteUser>> {
        if self.users.is_none() {
            let listed = self.list_users().await?;
            self.users = Some(listed);
        }
        Ok(self.users.get_or_insert_with(Vec::new))
    }
}

impl Directory for DirectoryClient {
    async fn find_department(&mut self, external_id: &str) -> ApiResult<Option<RemoteDepartment>> {
        let cache = self.department_cache().await?;
        Ok(cache
            .iter()
            .find(|d| d.external_id() == Some(external_id))
            .cloned())
    }

    async fn find_unclaimed_departments(&mut self, name: &str) -> ApiResult<Vec<RemoteDepartment>> {
        let cache = self.department_cache().await?;
        Ok(cache
            .iter()
            .filter(|d| d.external_id().is_none() && d.name == name)
            .cloned()
            .collect())
    }

    async fn create_department(&mut self, department: &NewDepartment) -> ApiResult<RemoteDepartment> {
        let mut created = self.post_department(department).await?;
        if created.external_id().is_none() {
            created.external_id = Some(department.external_id.clone());
        }
        debug!(id = created.id, external_id = %department.external_id, "Department created");
        if let Some(cache) = self.departments.as_mut() {
            cache.push(created.clone());
        }
        self.throttle().await;
        Ok(created)
    }

    async fn update_department(&mut self, id: u64, patch: &DepartmentPatch) -> ApiResult<()> {
        self.patch_department(id, patch).await?;
        if let Some(cached) = self
            .departments
            .as_mut()
            .and_then(|cache| cache.iter_mut().find(|d| d.id == id))
        {
            cached.apply(patch);
        }
        self.throttle().await;
        Ok(())
    }

    async fn find_user(&mut self, nickname: &str) -> ApiResult<Option<RemoteUser>> {
        let cache = self.user_cache().await?;
        Ok(cache.iter().find(|u| u.nickname == nickname).cloned())
    }

    async fn create_user(&mut self, user: &NewUser) -> ApiResult<RemoteUser> {
        let created = self.post_user(user).await?;
        debug!(id = %created.id, nickname = %user.nickname, "User created");
        if let Some(cache) = self.users.as_mut() {
            cache.push(created.clone());
        }
        self.throttle().await;
        Ok(created)
    }

    async fn update_user(&mut self, id: &str, patch: &UserPatch) -> ApiResult<()> {
        self.patch_user(id, patch).await?;
        if let Some(cached) = self
            .users
            .as_mut()
            .and_then(|cache| cache.iter_mut().find(|u| u.id == id))
        {
            cached.apply(patch);
        }
        self.throttle().await;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.departments = None;
        self.users = None;
    }
}
