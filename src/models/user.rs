//! User records, local and remote

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

/// A user as described by one row of `users.csv`.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// Login, unique within the organization
    pub nickname: String,
    pub first: String,
    pub last: String,
    pub middle: Option<String>,
    pub position: Option<String>,
    pub dept_external_id: String,
    pub language: String,
    pub timezone: String,
    /// Sent on create only
    pub password: Option<String>,
    pub password_change_required: bool,
    /// User-level external id, unrelated to department linkage
    pub external_id: Option<String>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("nickname", &self.nickname)
            .field("first", &self.first)
            .field("last", &self.last)
            .field("middle", &self.middle)
            .field("position", &self.position)
            .field("dept_external_id", &self.dept_external_id)
            .field("language", &self.language)
            .field("timezone", &self.timezone)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_change_required", &self.password_change_required)
            .field("external_id", &self.external_id)
            .finish()
    }
}

/// Structured person name used by the directory API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserName {
    #[serde(default)]
    pub first: String,

    #[serde(default)]
    pub last: String,

    #[serde(default)]
    pub middle: String,
}

/// A user as returned by the directory API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    pub id: String,

    pub nickname: String,

    #[serde(default)]
    pub department_id: Option<u64>,

    #[serde(default)]
    pub name: UserName,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub external_id: Option<String>,
}

impl RemoteUser {
    /// Fold a successful patch into this cached copy.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(position) = &patch.position {
            self.position = Some(position.clone());
        }
        if let Some(department_id) = patch.department_id {
            self.department_id = Some(department_id);
        }
        if let Some(language) = &patch.language {
            self.language = Some(language.clone());
        }
        if let Some(timezone) = &patch.timezone {
            self.timezone = Some(timezone.clone());
        }
    }
}

/// Body of a user create request.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub nickname: String,
    pub department_id: u64,
    pub name: UserName,
    pub position: String,
    pub language: String,
    pub timezone: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    pub password_change_required: bool,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("nickname", &self.nickname)
            .field("department_id", &self.department_id)
            .field("name", &self.name)
            .field("position", &self.position)
            .field("language", &self.language)
            .field("timezone", &self.timezone)
            .field("external_id", &self.external_id)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_change_required", &self.password_change_required)
            .finish()
    }
}

impl NewUser {
    /// Build the create payload for `user` placed in department `department_id`.
    pub fn from_user(user: &User, department_id: u64) -> Self {
        Self {
            nickname: user.nickname.clone(),
            department_id,
            name: UserName {
                first: user.first.clone(),
                last: user.last.clone(),
                middle: user.middle.clone().unwrap_or_default(),
            },
            position: user.position.clone().unwrap_or_default(),
            language: user.language.clone(),
            timezone: user.timezone.clone(),
            external_id: user.external_id.clone(),
            password: user.password.clone(),
            password_change_required: user.password_change_required,
        }
    }
}

/// Partial update of a user. Passwords are never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<UserName>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
