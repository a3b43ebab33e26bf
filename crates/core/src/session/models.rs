#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Identity, Role};

/// Client-held record of the signed-in identity and its credentials.
///
/// `user` is present exactly when `access_token` is; the store never builds or
/// persists anything in between.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Signed-in account.
    pub user: Option<Identity>,
    /// Bearer token for API calls.
    pub access_token: Option<String>,
    /// Token used to obtain a new access token.
    pub refresh_token: Option<String>,
}

impl Session {
    /// Session with no identity and no tokens.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Body returned by the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: Identity,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    /// Absent when the server keeps the current refresh token valid.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub phone_number: String,
    pub password: String,
}

/// Registration request body.
///
/// `secret_key` is the shared invitation value handed out by an admin; the
/// server decides whether it matches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub phone_number: String,
    pub password: String,
    pub secret_key: String,
}
