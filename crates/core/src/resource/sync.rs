use std::{future::Future, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    cache::{QueryCache, ResourceKey},
    error::ApiError,
    models::{
        ExchangeRate, Identity, NewPurchase, NewShoe, NewUser, Purchase, PurchaseUpdate, Role,
        Shoe, ShoeUpdate, StockItem, User, UserUpdate,
    },
    session::SessionStore,
    validation,
};

use super::{keys, with_refresh};

/// Outcome class of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The write was accepted.
    Success,
    /// The write failed; nothing was invalidated.
    Error,
}

/// Transient message describing the outcome of one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short headline.
    pub title: String,
    /// Detail line; the server message on failure.
    pub description: String,
    /// Success or failure.
    pub severity: Severity,
}

struct Mutation {
    success: &'static str,
    detail: &'static str,
    failure: &'static str,
    invalidates: &'static [&'static str],
}

const SHOE_WRITE: &[&str] = &[keys::SHOES, keys::STOCK];
const STOCK_WRITE: &[&str] = &[keys::STOCK, keys::SHOES];
const PURCHASE_WRITE: &[&str] = &[keys::PURCHASES, keys::SUPPLIERS, keys::STOCK];
const USER_WRITE: &[&str] = &[keys::USERS];
const RATE_WRITE: &[&str] = &[keys::EXCHANGE_RATE, keys::PURCHASES];

const CREATE_SHOE: Mutation = Mutation {
    success: "Shoe added",
    detail: "The shoe was added to the catalogue.",
    failure: "Could not add shoe",
    invalidates: SHOE_WRITE,
};
const UPDATE_SHOE: Mutation = Mutation {
    success: "Shoe updated",
    detail: "Your changes were saved.",
    failure: "Could not update shoe",
    invalidates: SHOE_WRITE,
};
const DELETE_SHOE: Mutation = Mutation {
    success: "Shoe deleted",
    detail: "The shoe was removed from the catalogue.",
    failure: "Could not delete shoe",
    invalidates: SHOE_WRITE,
};
const UPDATE_STOCK: Mutation = Mutation {
    success: "Stock updated",
    detail: "The new quantity was saved.",
    failure: "Could not update stock",
    invalidates: STOCK_WRITE,
};
const CREATE_PURCHASE: Mutation = Mutation {
    success: "Purchase added",
    detail: "The purchase was recorded.",
    failure: "Could not add purchase",
    invalidates: PURCHASE_WRITE,
};
const UPDATE_PURCHASE: Mutation = Mutation {
    success: "Purchase updated",
    detail: "Your changes were saved.",
    failure: "Could not update purchase",
    invalidates: PURCHASE_WRITE,
};
const DELETE_PURCHASE: Mutation = Mutation {
    success: "Purchase deleted",
    detail: "The purchase was removed.",
    failure: "Could not delete purchase",
    invalidates: PURCHASE_WRITE,
};
const MARK_TODO: Mutation = Mutation {
    success: "Moved to todo",
    detail: "The purchase is waiting to be collected.",
    failure: "Could not update purchase",
    invalidates: PURCHASE_WRITE,
};
const MARK_DONE: Mutation = Mutation {
    success: "Marked as done",
    detail: "The purchase was completed.",
    failure: "Could not update purchase",
    invalidates: PURCHASE_WRITE,
};
const CREATE_USER: Mutation = Mutation {
    success: "User created",
    detail: "The account can now log in.",
    failure: "Could not create user",
    invalidates: USER_WRITE,
};
const UPDATE_USER: Mutation = Mutation {
    success: "User updated",
    detail: "Your changes were saved.",
    failure: "Could not update user",
    invalidates: USER_WRITE,
};
const DELETE_USER: Mutation = Mutation {
    success: "User deleted",
    detail: "The account was removed.",
    failure: "Could not delete user",
    invalidates: USER_WRITE,
};
const CHANGE_ROLE: Mutation = Mutation {
    success: "Role changed",
    detail: "The new access level applies from the next request.",
    failure: "Could not change role",
    invalidates: USER_WRITE,
};
const RESET_USER_PASSWORD: Mutation = Mutation {
    success: "Password reset",
    detail: "The user can log in with the new password.",
    failure: "Could not reset password",
    invalidates: USER_WRITE,
};
const SET_EXCHANGE_RATE: Mutation = Mutation {
    success: "Exchange rate updated",
    detail: "Prices now use the new rate.",
    failure: "Could not update exchange rate",
    invalidates: RATE_WRITE,
};

/// Write side of the inventory.
///
/// Every operation validates its input (no request is made when that fails),
/// performs exactly one write, invalidates the affected resources once the
/// server has accepted it and reports the outcome as a [`Notification`].
#[derive(Clone)]
pub struct ResourceSync {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    cache: QueryCache,
    events: Option<mpsc::Sender<Notification>>,
}

impl ResourceSync {
    /// Synchroniser without a notification channel.
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionStore>, cache: QueryCache) -> Self {
        Self {
            api,
            session,
            cache,
            events: None,
        }
    }

    /// Deliver a [`Notification`] per outcome on `events`.
    pub fn with_events(mut self, events: mpsc::Sender<Notification>) -> Self {
        self.events = Some(events);
        self
    }

    /// Add a shoe to the catalogue.
    pub async fn create_shoe(&self, shoe: &NewShoe) -> Result<Shoe, ApiError> {
        shoe.validate()?;
        self.run(&CREATE_SHOE, || self.api.create_shoe(shoe)).await
    }

    /// Edit catalogue details of a shoe.
    pub async fn update_shoe(&self, id: &str, update: &ShoeUpdate) -> Result<Shoe, ApiError> {
        update.validate()?;
        self.run(&UPDATE_SHOE, || self.api.update_shoe(id, update))
            .await
    }

    /// Remove a shoe from the catalogue.
    pub async fn delete_shoe(&self, id: &str) -> Result<(), ApiError> {
        self.run(&DELETE_SHOE, || self.api.delete_shoe(id)).await
    }

    /// Set the on-hand quantity of a stock item. Zero is allowed.
    pub async fn update_stock(&self, id: &str, quantity: i64) -> Result<StockItem, ApiError> {
        validation::quantity("quantity", quantity, 0)?;
        self.run(&UPDATE_STOCK, || self.api.update_stock(id, quantity))
            .await
    }

    /// Record a purchase from a supplier.
    pub async fn create_purchase(&self, purchase: &NewPurchase) -> Result<Purchase, ApiError> {
        purchase.validate()?;
        self.run(&CREATE_PURCHASE, || self.api.create_purchase(purchase))
            .await
    }

    /// Edit a recorded purchase.
    pub async fn update_purchase(
        &self,
        id: &str,
        update: &PurchaseUpdate,
    ) -> Result<Purchase, ApiError> {
        update.validate()?;
        self.run(&UPDATE_PURCHASE, || self.api.update_purchase(id, update))
            .await
    }

    /// Remove a purchase.
    pub async fn delete_purchase(&self, id: &str) -> Result<(), ApiError> {
        self.run(&DELETE_PURCHASE, || self.api.delete_purchase(id))
            .await
    }

    /// Move a purchase back to the todo list.
    pub async fn mark_todo(&self, id: &str) -> Result<Purchase, ApiError> {
        self.run(&MARK_TODO, || self.api.mark_purchase_todo(id)).await
    }

    /// Complete a purchase; the server adds its quantity to stock.
    pub async fn mark_done(&self, id: &str) -> Result<Purchase, ApiError> {
        self.run(&MARK_DONE, || self.api.mark_purchase_done(id)).await
    }

    /// Create an account.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        user.validate()?;
        self.run(&CREATE_USER, || self.api.create_user(user)).await
    }

    /// Edit an account. Editing the signed-in account also updates the session.
    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<User, ApiError> {
        update.validate()?;
        let user = self
            .run(&UPDATE_USER, || self.api.update_user(id, update))
            .await?;
        self.sync_own_identity(&user)?;
        Ok(user)
    }

    /// Remove an account.
    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.run(&DELETE_USER, || self.api.delete_user(id)).await
    }

    /// Change an account's access level, following it in the session when it is our own.
    pub async fn change_role(&self, id: &str, role: Role) -> Result<User, ApiError> {
        let user = self
            .run(&CHANGE_ROLE, || self.api.change_role(id, role))
            .await?;
        self.sync_own_identity(&user)?;
        Ok(user)
    }

    /// Set a new password on someone else's account.
    pub async fn reset_user_password(&self, id: &str, password: &str) -> Result<(), ApiError> {
        validation::password(password)?;
        self.run(&RESET_USER_PASSWORD, || {
            self.api.reset_user_password(id, password)
        })
        .await
    }

    /// Replace the USD to IQD rate.
    pub async fn set_exchange_rate(&self, rate: f64) -> Result<ExchangeRate, ApiError> {
        validation::positive_amount("rate", rate)?;
        self.run(&SET_EXCHANGE_RATE, || self.api.set_exchange_rate(rate))
            .await
    }

    fn sync_own_identity(&self, user: &User) -> Result<(), ApiError> {
        if self.session.replace_user(Identity::from(user))? {
            info!("session identity updated for {}", user.id);
        }
        Ok(())
    }

    async fn run<T, F, Fut>(&self, mutation: &Mutation, call: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let prefixes = mutation
            .invalidates
            .iter()
            .map(|resource| ResourceKey::new(*resource))
            .collect::<Vec<_>>();

        let action = with_refresh(&self.session, &self.api, &self.cache, call);
        let result = self.cache.mutate(action, &prefixes).await;

        match &result {
            Ok(_) => self.notify(Notification {
                title: mutation.success.to_string(),
                description: mutation.detail.to_string(),
                severity: Severity::Success,
            }),
            Err(err) => {
                warn!("{}: {err}", mutation.failure);
                self.notify(Notification {
                    title: mutation.failure.to_string(),
                    description: err.user_message(),
                    severity: Severity::Error,
                });
            }
        }
        result
    }

    fn notify(&self, notification: Notification) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.try_send(notification) {
            debug!("notification dropped: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        models::Currency,
        resource::{
            test_support::{signed_in, signed_out, Harness},
            ResourceLoader,
        },
    };

    const USER: &str = r#"{"id":"u1","name":"Aram","phoneNumber":"07501234567","role":"admin"}"#;

    fn wire(harness: &Harness) -> (ResourceLoader, ResourceSync, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(8);
        let loader = ResourceLoader::new(
            Arc::clone(&harness.api),
            Arc::clone(&harness.session),
            harness.cache.clone(),
            Duration::from_secs(300),
        );
        let sync = ResourceSync::new(
            Arc::clone(&harness.api),
            Arc::clone(&harness.session),
            harness.cache.clone(),
        )
        .with_events(tx);
        (loader, sync, rx)
    }

    fn purchase() -> NewPurchase {
        NewPurchase {
            shoe_id: "s1".to_string(),
            supplier: "Nawroz Trading".to_string(),
            quantity: 12,
            unit_price: 18.5,
            currency: Currency::Usd,
            note: None,
        }
    }

    #[tokio::test]
    async fn created_purchase_forces_a_refetch() -> Result<(), ApiError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/purchases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/purchases"))
            .and(body_json(json!({
                "shoeId": "s1",
                "supplier": "Nawroz Trading",
                "quantity": 12,
                "unitPrice": 18.5,
                "currency": "USD"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p1",
                "shoeId": "s1",
                "supplier": "Nawroz Trading",
                "quantity": 12,
                "unitPrice": 18.5,
                "currency": "USD",
                "status": "todo"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let harness = signed_in(&server, USER);
        let (loader, sync, mut rx) = wire(&harness);

        assert!(loader.purchases(None).await?.is_ready());
        assert!(loader.purchases(None).await?.is_ready());

        let created = sync.create_purchase(&purchase()).await?;
        assert_eq!(created.id, "p1");
        assert!(!harness
            .cache
            .is_fresh(&ResourceKey::new(keys::PURCHASES).with("list").with("*"), Duration::from_secs(300)));

        assert!(loader.purchases(None).await?.is_ready());

        let notification = rx.try_recv().expect("success notification");
        assert_eq!(notification.severity, Severity::Success);
        assert_eq!(notification.title, "Purchase added");
        Ok(())
    }

    #[tokio::test]
    async fn failed_mutation_keeps_cache_and_reports_server_message() -> Result<(), ApiError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shoes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "s1", "name": "Runner", "brand": "Zagros", "price": 30.0 }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/shoes/s1"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({ "message": "Shoe still has stock" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let harness = signed_in(&server, USER);
        let (loader, sync, mut rx) = wire(&harness);
        let filter = Default::default();

        assert!(loader.shoes(&filter).await?.is_ready());
        let err = sync.delete_shoe("s1").await.expect_err("conflict");
        assert!(matches!(err, ApiError::Server { status: 409, .. }));

        let shoes = loader.shoes(&filter).await?.data().unwrap_or_default();
        assert_eq!(shoes.len(), 1);

        let notification = rx.try_recv().expect("error notification");
        assert_eq!(notification.severity, Severity::Error);
        assert_eq!(notification.title, "Could not delete shoe");
        assert_eq!(notification.description, "Shoe still has stock");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let harness = signed_in(&server, USER);
        let (_, sync, mut rx) = wire(&harness);

        let mut bad = purchase();
        bad.quantity = 0;
        let err = sync.create_purchase(&bad).await.expect_err("quantity");
        assert!(matches!(err, ApiError::Validation(ref v) if v.field == "quantity"));

        let err = sync.set_exchange_rate(-1.0).await.expect_err("rate");
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stock_can_be_set_to_zero() -> Result<(), ApiError> {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/stock/st1"))
            .and(body_json(json!({ "quantity": 0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "st1", "shoeId": "s1", "quantity": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let harness = signed_in(&server, USER);
        let (_, sync, _rx) = wire(&harness);
        assert_eq!(sync.update_stock("st1", 0).await?.quantity, 0);
        assert!(sync.update_stock("st1", -2).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn editing_own_account_updates_the_session() -> Result<(), ApiError> {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/users/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1", "name": "Aram K.", "phoneNumber": "07501234567", "role": "admin"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/users/u2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u2", "name": "Dilan", "phoneNumber": "07700000000", "role": "user"
            })))
            .mount(&server)
            .await;

        let harness = signed_in(&server, USER);
        let (_, sync, _rx) = wire(&harness);

        let rename = UserUpdate {
            name: Some("Aram K.".to_string()),
            ..Default::default()
        };
        sync.update_user("u1", &rename).await?;
        assert_eq!(
            harness.session.view().user().map(|user| user.name),
            Some("Aram K.".to_string())
        );

        let other = UserUpdate {
            name: Some("Dilan".to_string()),
            ..Default::default()
        };
        sync.update_user("u2", &other).await?;
        assert_eq!(
            harness.session.view().user().map(|user| user.id),
            Some("u1".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn signed_out_mutations_are_refused() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let harness = signed_out(&server);
        let (_, sync, mut rx) = wire(&harness);
        let err = sync.delete_purchase("p1").await.expect_err("signed out");
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(
            rx.try_recv().map(|n| n.severity).ok(),
            Some(Severity::Error)
        );
    }
}
