//! User endpoints

use serde::de::IgnoredAny;
use tracing::info;

use super::DirectoryClient;
use super::error::ApiResult;
use crate::models::{NewUser, Page, RemoteUser, UserPatch};

impl DirectoryClient {
    /// Fetch every user of the organization, following pagination
    pub async fn list_users(&self) -> ApiResult<Vec<RemoteUser>> {
        let mut users = Vec::new();
        let mut page: u32 = 1;
        loop {
            let response: Page<RemoteUser> = self
                .get_json(
                    "users",
                    &[
                        ("page", page.to_string()),
                        ("perPage", self.page_size().to_string()),
                    ],
                )
                .await?;
            let last = response.is_last(page);
            users.extend(response.items);
            if last {
                break;
            }
            page += 1;
        }
        info!(count = users.len(), "Fetched remote users");
        Ok(users)
    }

    /// Create a user
    pub async fn post_user(&self, user: &NewUser) -> ApiResult<RemoteUser> {
        self.post_json("users", user).await
    }

    /// Apply a partial update to a user
    pub async fn patch_user(&self, id: &str, patch: &UserPatch) -> ApiResult<()> {
        let _: IgnoredAny = self.patch_json(&format!("users/{id}"), patch).await?;
        Ok(())
    }
}
