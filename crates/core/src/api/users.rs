use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{NewUser, Role, User, UserUpdate},
};

#[derive(Serialize)]
struct RoleChange {
    role: Role,
}

#[derive(Serialize)]
struct PasswordReset<'a> {
    password: &'a str,
}

impl ApiClient {
    /// Every account (admin only).
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get(&["users"]).await
    }

    /// Create an account on someone's behalf.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        self.send_json(Method::POST, &["users"], user).await
    }

    /// Change name or phone number.
    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<User, ApiError> {
        self.send_json(Method::PATCH, &["users", id], update).await
    }

    /// Remove an account.
    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::DELETE, &["users", id], None)
            .await
    }

    /// Promote or demote an account.
    pub async fn change_role(&self, id: &str, role: Role) -> Result<User, ApiError> {
        self.send_json(Method::PATCH, &["users", id, "role"], &RoleChange { role })
            .await
    }

    /// Overwrite an account's password.
    pub async fn reset_user_password(&self, id: &str, password: &str) -> Result<(), ApiError> {
        self.send_unit(
            Method::POST,
            &["users", id, "reset-password"],
            Some(&PasswordReset { password }),
        )
        .await
    }
}
