use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    api::ApiClient,
    cache::{QueryCache, QueryOptions, QueryState, ResourceKey},
    error::ApiError,
    models::{
        ExchangeRate, Purchase, PurchaseStatus, Role, Shoe, ShoeFilter, StockFilter, StockItem,
        Supplier, TodoGroup, User,
    },
    session::SessionStore,
};

use super::{keys, with_refresh};

/// Read side of the inventory: every query is cached under a
/// [`ResourceKey`] and gated on the session being restored and signed in.
#[derive(Clone)]
pub struct ResourceLoader {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    cache: QueryCache,
    ttl: Duration,
}

impl ResourceLoader {
    /// Build a loader sharing `cache` with the matching [`ResourceSync`](super::ResourceSync).
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<SessionStore>,
        cache: QueryCache,
        ttl: Duration,
    ) -> Self {
        Self {
            api,
            session,
            cache,
            ttl,
        }
    }

    /// Freshness window applied to every query.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Catalogue, optionally filtered by a search term.
    pub async fn shoes(&self, filter: &ShoeFilter) -> Result<QueryState<Vec<Shoe>>, ApiError> {
        let filter = ShoeFilter {
            search: filter
                .search
                .as_deref()
                .map(str::trim)
                .filter(|search| !search.is_empty())
                .map(str::to_string),
        };
        let key = ResourceKey::new(keys::SHOES)
            .with("list")
            .with_opt(filter.search.clone());
        self.fetch(key, true, move |api| {
            let filter = filter.clone();
            async move { api.list_shoes(&filter).await }
        })
        .await
    }

    /// One shoe by id.
    pub async fn shoe(&self, id: &str) -> Result<QueryState<Shoe>, ApiError> {
        let key = ResourceKey::new(keys::SHOES).with("detail").with(id);
        let id = id.to_string();
        self.fetch(key, true, move |api| {
            let id = id.clone();
            async move { api.get_shoe(&id).await }
        })
        .await
    }

    /// Stock levels, optionally for a single shoe.
    pub async fn stock(&self, filter: &StockFilter) -> Result<QueryState<Vec<StockItem>>, ApiError> {
        let key = ResourceKey::new(keys::STOCK).with_opt(filter.shoe_id.as_deref());
        let filter = filter.clone();
        self.fetch(key, true, move |api| {
            let filter = filter.clone();
            async move { api.list_stock(&filter).await }
        })
        .await
    }

    /// Purchases, optionally restricted to one status.
    pub async fn purchases(
        &self,
        status: Option<PurchaseStatus>,
    ) -> Result<QueryState<Vec<Purchase>>, ApiError> {
        let key = ResourceKey::new(keys::PURCHASES)
            .with("list")
            .with_opt(status.map(|status| status.as_str()));
        self.fetch(key, true, move |api| async move {
            api.list_purchases(status).await
        })
        .await
    }

    /// Outstanding purchases grouped by supplier.
    pub async fn todo_purchases(&self) -> Result<QueryState<Vec<TodoGroup>>, ApiError> {
        let key = ResourceKey::new(keys::PURCHASES).with("todo-groups");
        self.fetch(key, true, |api| async move { api.todo_purchases().await })
            .await
    }

    /// Suppliers known from past purchases.
    pub async fn suppliers(&self) -> Result<QueryState<Vec<Supplier>>, ApiError> {
        self.fetch(ResourceKey::new(keys::SUPPLIERS), true, |api| async move {
            api.list_suppliers().await
        })
        .await
    }

    /// Account list; only fetched for admins.
    pub async fn users(&self) -> Result<QueryState<Vec<User>>, ApiError> {
        let is_admin = self.session.view().role() == Some(Role::Admin);
        self.fetch(ResourceKey::new(keys::USERS), is_admin, |api| async move {
            api.list_users().await
        })
        .await
    }

    /// Current USD to IQD rate.
    pub async fn exchange_rate(&self) -> Result<QueryState<ExchangeRate>, ApiError> {
        self.fetch(ResourceKey::new(keys::EXCHANGE_RATE), true, |api| async move {
            api.exchange_rate().await
        })
        .await
    }

    async fn fetch<T, F, Fut>(
        &self,
        key: ResourceKey,
        allowed: bool,
        call: F,
    ) -> Result<QueryState<T>, ApiError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<ApiClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let enabled = allowed && self.session.view().is_ready();
        let options = QueryOptions::new(self.ttl).enabled(enabled);

        let api = Arc::clone(&self.api);
        let session = Arc::clone(&self.session);
        let cache = self.cache.clone();
        self.cache
            .query(key, options, move || async move {
                with_refresh(&session, &api, &cache, || call(Arc::clone(&api))).await
            })
            .await
    }
}
