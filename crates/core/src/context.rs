//! Wiring of storage, session, API client, cache and resources for one process.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::{
    api::ApiClient,
    cache::QueryCache,
    config::AppConfig,
    error::ApiError,
    models::Identity,
    preferences::Preferences,
    resource::{Notification, ResourceLoader, ResourceSync},
    session::{SessionStore, SessionView},
    storage::{FileStore, KeyValueStore},
};

const NOTIFICATION_BUFFER: usize = 32;

/// Everything a front end needs, owned in one place.
pub struct AppContext {
    config: AppConfig,
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    cache: QueryCache,
    loader: ResourceLoader,
    sync: ResourceSync,
    preferences: Preferences,
    notifications: Option<mpsc::Receiver<Notification>>,
}

impl AppContext {
    /// Open the context on the storage file named by `config`, restoring any persisted session.
    pub fn open(config: AppConfig) -> Result<Self> {
        let storage = Arc::new(FileStore::new(&config.storage_path));
        Self::with_storage(config, storage)
    }

    /// Open the context on an arbitrary store.
    pub fn with_storage(config: AppConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let session = Arc::new(SessionStore::open(Arc::clone(&storage)));
        let api = Arc::new(
            ApiClient::from_config(&config)
                .context("failed to create API client")?
                .with_session(session.view()),
        );
        let cache = QueryCache::new();
        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);

        let loader = ResourceLoader::new(
            Arc::clone(&api),
            Arc::clone(&session),
            cache.clone(),
            config.cache_ttl(),
        );
        let sync =
            ResourceSync::new(Arc::clone(&api), Arc::clone(&session), cache.clone()).with_events(tx);
        let preferences = Preferences::new(storage, config.language);

        info!("using API at {}", api.base_url());
        Ok(Self {
            config,
            session,
            api,
            cache,
            loader,
            sync,
            preferences,
            notifications: Some(rx),
        })
    }

    /// Sign in, dropping anything cached for a previous user.
    pub async fn login(&self, phone_number: &str, password: &str) -> Result<Identity, ApiError> {
        let identity = self
            .session
            .login(self.api.as_ref(), phone_number, password)
            .await?;
        self.cache.clear();
        Ok(identity)
    }

    /// Create an account and sign it in.
    pub async fn register(
        &self,
        name: &str,
        phone_number: &str,
        password: &str,
        invitation_secret: &str,
    ) -> Result<Identity, ApiError> {
        let identity = self
            .session
            .register(
                self.api.as_ref(),
                name,
                phone_number,
                password,
                invitation_secret,
            )
            .await?;
        self.cache.clear();
        Ok(identity)
    }

    /// End the session and forget every cached resource.
    pub fn logout(&self) {
        self.session.logout();
        self.cache.clear();
    }

    /// Configuration the context was opened with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Session writer.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Read-only session handle.
    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    /// Raw API client, for calls that neither cache nor invalidate.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Cached queries.
    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    /// Invalidating mutations.
    pub fn sync(&self) -> &ResourceSync {
        &self.sync
    }

    /// Language preference.
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Receiver for mutation outcomes. Only the first call gets it.
    pub fn take_notifications(&mut self) -> Option<mpsc::Receiver<Notification>> {
        self.notifications.take()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        cache::ResourceKey,
        models::ShoeFilter,
        preferences::Language,
        resource::{keys, Severity},
        storage::{MemoryStore, LANGUAGE_KEY},
    };

    fn config(server: &MockServer) -> AppConfig {
        AppConfig {
            api_base_url: server.uri(),
            ..AppConfig::default()
        }
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": { "id": "u1", "name": "Aram", "phoneNumber": "07501234567", "role": "admin" },
                "accessToken": "tok",
                "refreshToken": "ref"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn session_survives_reopening_the_store() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let dir = tempdir()?;
        let config = AppConfig {
            storage_path: dir.path().join("storage.json"),
            ..config(&server)
        };

        let context = AppContext::open(config.clone())?;
        assert!(!context.view().is_authenticated());
        context.login("0750 123 4567", "secret1").await?;

        let reopened = AppContext::open(config)?;
        assert!(reopened.view().is_ready());
        assert_eq!(reopened.view().user().map(|user| user.id), Some("u1".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn logout_empties_the_cache_but_keeps_preferences() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/shoes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStore::new());
        let context = AppContext::with_storage(config(&server), storage.clone())?;
        context.preferences().set_language(Language::Arabic)?;
        context.login("07501234567", "secret1").await?;

        assert!(context.loader().shoes(&ShoeFilter::default()).await?.is_ready());
        assert!(!context.cache.is_empty());

        context.logout();
        assert!(context.cache.is_empty());
        assert!(!context.view().is_authenticated());
        assert_eq!(storage.get(LANGUAGE_KEY)?.as_deref(), Some("ar"));
        assert!(context
            .cache
            .peek::<Vec<crate::models::Shoe>>(&ResourceKey::new(keys::SHOES).with("list").with("*"))
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn notifications_reach_the_receiver() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("PUT"))
            .and(path("/exchange-rate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rate": 1320.0 })))
            .mount(&server)
            .await;

        let mut context = AppContext::with_storage(config(&server), Arc::new(MemoryStore::new()))?;
        let mut rx = context.take_notifications().expect("first take");
        assert!(context.take_notifications().is_none());

        context.login("07501234567", "secret1").await?;
        context.sync().set_exchange_rate(1320.0).await?;
        let notification = rx.recv().await.expect("notification");
        assert_eq!(notification.severity, Severity::Success);
        Ok(())
    }
}
