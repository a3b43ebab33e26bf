//! Shared domain models exchanged with the API.

mod inventory;
mod user;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use inventory::{
    Currency, ExchangeRate, NewPurchase, NewShoe, Purchase, PurchaseStatus, PurchaseUpdate, Shoe,
    ShoeFilter, ShoeUpdate, StockFilter, StockItem, Supplier, TodoGroup,
};
pub use user::{NewUser, User, UserUpdate};

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including user management and the exchange rate.
    Admin,
    /// Day-to-day inventory work.
    #[default]
    User,
}

impl Role {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The signed-in account as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Server-assigned identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Login identifier.
    #[serde(default)]
    pub phone_number: String,
    /// Access level.
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    /// Whether the account may use admin-only operations.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns a user-facing label combining name and phone number.
    pub fn display_name(&self) -> String {
        match (self.name.trim(), self.phone_number.trim()) {
            ("", "") => self.id.clone(),
            (name, "") => name.to_string(),
            ("", phone) => phone.to_string(),
            (name, phone) => format!("{name} · {phone}"),
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role,
        }
    }
}
