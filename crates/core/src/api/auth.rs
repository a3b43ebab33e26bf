use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::{
    error::{ApiError, ValidationError},
    session::{AuthBackend, AuthResponse, Credentials, Registration, TokenPair},
    validation,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ForgotPasswordRequest<'a> {
    phone_number: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenCheck {
    #[serde(default)]
    valid: bool,
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, &["auth", "login"], credentials)
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, &["auth", "register"], registration)
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.send_json(
            Method::POST,
            &["auth", "refresh"],
            &RefreshRequest { refresh_token },
        )
        .await
    }
}

impl ApiClient {
    /// Ask the server to send a password reset code to `phone_number`.
    pub async fn forgot_password(&self, phone_number: &str) -> Result<(), ApiError> {
        validation::phone_number(phone_number)?;
        let phone_number = validation::normalize_phone(phone_number);
        self.send_unit(
            Method::POST,
            &["auth", "forgot-password"],
            Some(&ForgotPasswordRequest {
                phone_number: &phone_number,
            }),
        )
        .await
    }

    /// Whether a reset token is still usable.
    pub async fn verify_reset_token(&self, token: &str) -> Result<bool, ApiError> {
        validation::name("token", token)?;
        let check: TokenCheck = self
            .get(&["auth", "verify-reset-token", token.trim()])
            .await?;
        Ok(check.valid)
    }

    /// Set a new password using a reset token.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        if token.trim().is_empty() {
            return Err(ValidationError::new("token", "is required").into());
        }
        validation::password(password)?;
        self.send_unit(
            Method::POST,
            &["auth", "reset-password"],
            Some(&ResetPasswordRequest {
                token: token.trim(),
                password,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        session::SessionStore,
        storage::{KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY},
    };

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), Duration::from_secs(5)).expect("valid client")
    }

    #[tokio::test]
    async fn login_through_session_store() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({
                "phoneNumber": "07501234567",
                "password": "secret123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": { "id": "u1", "role": "user" },
                "accessToken": "tok",
                "refreshToken": "ref"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStore::new());
        let session = SessionStore::open(storage.clone());
        let api = client(&server).with_session(session.view());

        let user = session.login(&api, "07501234567", "secret123").await?;
        assert_eq!(user.id, "u1");
        assert_eq!(storage.get(ACCESS_TOKEN_KEY)?.as_deref(), Some("tok"));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_login_reports_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "message": "Invalid phone number or password" })),
            )
            .mount(&server)
            .await;

        let session = SessionStore::open(Arc::new(MemoryStore::new()));
        let err = session
            .login(&client(&server), "07501234567", "wrong-pass")
            .await
            .expect_err("rejected");
        assert_eq!(err.to_string(), "Invalid phone number or password");
        assert!(!session.view().is_authenticated());
    }

    #[tokio::test]
    async fn password_recovery_flow() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/forgot-password"))
            .and(body_json(json!({ "phoneNumber": "07501234567" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/verify-reset-token/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/reset-password"))
            .and(body_json(json!({ "token": "abc123", "password": "new-secret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.forgot_password("0750 123 4567").await?;
        assert!(api.verify_reset_token("abc123").await?);
        api.reset_password("abc123", "new-secret").await?;

        let err = api
            .reset_password("abc123", "short")
            .await
            .expect_err("too short");
        assert!(matches!(err, ApiError::Validation(_)));
        Ok(())
    }
}
