//! Cached queries and invalidating mutations over the API.

/// Session-gated, cached read queries.
pub mod loader;
/// Mutations with cache invalidation and user notifications.
pub mod sync;

use std::future::Future;

use tracing::debug;

use crate::{api::ApiClient, cache::QueryCache, error::ApiError, session::SessionStore};

pub use loader::ResourceLoader;
pub use sync::{Notification, ResourceSync, Severity};

/// Resource type names, the first segment of every cache key.
pub mod keys {
    /// Shoe catalogue lists and details.
    pub const SHOES: &str = "shoes";
    /// Stock levels.
    pub const STOCK: &str = "stock";
    /// Purchase lists and supplier groupings.
    pub const PURCHASES: &str = "purchases";
    /// Supplier directory.
    pub const SUPPLIERS: &str = "suppliers";
    /// Account list.
    pub const USERS: &str = "users";
    /// USD to IQD rate.
    pub const EXCHANGE_RATE: &str = "exchange-rate";
}

/// Run an authenticated call, refreshing the access token and retrying once
/// when the server rejects it. A session that cannot be refreshed is ended and
/// the cache emptied along with it.
pub(crate) async fn with_refresh<T, F, Fut>(
    session: &SessionStore,
    api: &ApiClient,
    cache: &QueryCache,
    call: F,
) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let Some(token) = session.view().access_token() else {
        return Err(ApiError::Unauthenticated);
    };

    match call().await {
        Err(err) if err.is_unauthorized() => {
            debug!("access token rejected, refreshing");
            if let Err(refresh_err) = session.refresh(api, Some(&token)).await {
                if matches!(refresh_err, ApiError::Unauthenticated) {
                    cache.clear();
                }
                return Err(refresh_err);
            }
            call().await
        }
        other => other,
    }
}
