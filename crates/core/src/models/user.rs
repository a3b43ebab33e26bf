use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;
use crate::{error::ValidationError, validation};

/// Account record as listed by the admin user screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login identifier.
    pub phone_number: String,
    /// Access level.
    #[serde(default)]
    pub role: Role,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating an account from the admin screens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login identifier.
    pub phone_number: String,
    /// Initial password.
    pub password: String,
    /// Access level.
    pub role: Role,
}

impl NewUser {
    /// Check every field before a request is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::name("name", &self.name)?;
        validation::phone_number(&self.phone_number)?;
        validation::password(&self.password)
    }
}

/// Partial update of an account; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New login identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl UserUpdate {
    /// Check the fields that are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::name("name", name)?;
        }
        if let Some(phone) = &self.phone_number {
            validation::phone_number(phone)?;
        }
        Ok(())
    }
}
