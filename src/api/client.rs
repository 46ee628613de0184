//! Directory REST API client

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::retry::RetryPolicy;
use crate::auth::TokenAuth;
use crate::config::Config;
use crate::models::{RemoteDepartment, RemoteUser};

/// HTTP client for one organization in the directory API.
///
/// Every request goes through the retry policy, and only one request is
/// ever in flight. Listings are cached for the lifetime of the client and
/// kept current as entities are created or updated through it.
pub struct DirectoryClient {
    http_client: Client,
    auth: TokenAuth,
    base_url: String,
    org_id: u64,
    retry: RetryPolicy,
    page_size: u32,
    throttle: Duration,
    pub(super) departments: Option<Vec<RemoteDepartment>>,
    pub(super) users: Option<Vec<RemoteUser>>,
}

impl DirectoryClient {
    /// Create a client for the configured organization
    pub fn new(config: &Config) -> ApiResult<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("orgsync/", env!("CARGO_PKG_VERSION")))
            .timeout(config.settings.request_timeout())
            .build()
            .map_err(|e| ApiError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Create a client around a pre-built `reqwest::Client`
    pub fn with_http_client(config: &Config, http_client: Client) -> Self {
        let settings = &config.settings;
        Self {
            http_client,
            auth: TokenAuth::new(settings.auth_scheme, config.token.clone()),
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            org_id: config.org_id,
            retry: RetryPolicy::from(&settings.retry),
            page_size: settings.page_size,
            throttle: settings.throttle(),
            departments: None,
            users: None,
        }
    }

    /// Override the retry policy derived from settings
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// URL of a resource under the organization
    fn org_url(&self, path: &str) -> String {
        format!(
            "{}/org/{}/{}",
            self.base_url,
            self.org_id,
            path.trim_start_matches('/')
        )
    }

    /// Make an authenticated GET request and deserialize the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = self.org_url(path);
        self.send(&format!("GET {path}"), || {
            self.http_client.get(&url).query(query)
        })
        .await
    }

    /// Make an authenticated POST request with a JSON body
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let url = self.org_url(path);
        self.send(&format!("POST {path}"), || {
            self.http_client.post(&url).json(body)
        })
        .await
    }

    /// Make an authenticated PATCH request with a JSON body
    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let url = self.org_url(path);
        self.send(&format!("PATCH {path}"), || {
            self.http_client.patch(&url).json(body)
        })
        .await
    }

    /// Pause after a mutating call so bursts stay under the rate limit
    pub(super) async fn throttle(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }

    async fn send<T, F>(&self, operation: &str, request: F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        self.retry
            .execute(operation, || {
                let request = self
                    .auth
                    .apply(request())
                    .header(reqwest::header::ACCEPT, "application/json");
                debug!(operation, "Sending directory request");
                async move {
                    let response = request.send().await?;
                    handle_response(response).await
                }
            })
            .await
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await?;
        // Some mutations answer with an empty body.
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        return serde_json::from_str(body)
            .map_err(|e| ApiError::Decode(format!("{e} (HTTP {status})")));
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status, retry_after, body))
}
