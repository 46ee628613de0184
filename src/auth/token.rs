//! Static token credential for the directory API

use reqwest::RequestBuilder;
use serde::Deserialize;
use std::fmt;

/// `Authorization` header scheme expected by the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: OAuth <token>`
    #[default]
    OAuth,
    /// `Authorization: Bearer <token>`
    Bearer,
}

impl AuthScheme {
    fn prefix(self) -> &'static str {
        match self {
            AuthScheme::OAuth => "OAuth",
            AuthScheme::Bearer => "Bearer",
        }
    }
}

/// Attaches the organization's API token to outgoing requests.
#[derive(Clone)]
pub struct TokenAuth {
    scheme: AuthScheme,
    token: String,
}

impl TokenAuth {
    pub fn new(scheme: AuthScheme, token: impl Into<String>) -> Self {
        Self {
            scheme,
            token: token.into().trim().to_string(),
        }
    }

    pub fn header_value(&self) -> String {
        format!("{} {}", self.scheme.prefix(), self.token)
    }

    /// Add the `Authorization` header to a request
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(reqwest::header::AUTHORIZATION, self.header_value())
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .finish()
    }
}
