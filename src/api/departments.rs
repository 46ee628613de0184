//! Department endpoints

use serde::de::IgnoredAny;
use tracing::info;

use super::DirectoryClient;
use super::error::ApiResult;
use crate::models::{DepartmentPatch, NewDepartment, Page, RemoteDepartment};

impl DirectoryClient {
    /// Fetch every department of the organization, following pagination
    pub async fn list_departments(&self) -> ApiResult<Vec<RemoteDepartment>> {
        let mut departments = Vec::new();
        let mut page: u32 = 1;
        loop {
            let response: Page<RemoteDepartment> = self
                .get_json(
                    "departments",
                    &[
                        ("page", page.to_string()),
                        ("perPage", self.page_size().to_string()),
                    ],
                )
                .await?;
            let last = response.is_last(page);
            departments.extend(response.items);
            if last {
                break;
            }
            page += 1;
        }
        info!(count = departments.len(), "Fetched remote departments");
        Ok(departments)
    }

    /// Create a department
    pub async fn post_department(&self, department: &NewDepartment) -> ApiResult<RemoteDepartment> {
        self.post_json("departments", department).await
    }

    /// Apply a partial update to a department
    pub async fn patch_department(&self, id: u64, patch: &DepartmentPatch) -> ApiResult<()> {
        let _: IgnoredAny = self.patch_json(&format!("departments/{id}"), patch).await?;
        Ok(())
    }
}
