use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::models::{AuthResponse, Credentials, Registration, Session, TokenPair};
use crate::{
    error::{ApiError, ValidationError},
    models::{Identity, Role},
    storage::{KeyValueStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_KEY},
    validation,
};

/// Remote side of authentication. Implemented by [`ApiClient`](crate::api::ApiClient).
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a session.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Create an account and sign it in.
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

#[derive(Debug)]
struct State {
    session: Session,
    loading: bool,
}

/// Read-only handle on the current session, cheap to clone and hand out.
#[derive(Debug, Clone)]
pub struct SessionView {
    state: Arc<RwLock<State>>,
}

impl SessionView {
    pub fn is_authenticated(&self) -> bool {
        self.state.read().session.is_authenticated()
    }

    /// True only while the persisted session is being restored.
    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// Restored and signed in; queries are gated on this.
    pub fn is_ready(&self) -> bool {
        let state = self.state.read();
        !state.loading && state.session.is_authenticated()
    }

    pub fn user(&self) -> Option<Identity> {
        self.state.read().session.user.clone()
    }

    pub fn role(&self) -> Option<Role> {
        self.state.read().session.role()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().session.access_token.clone()
    }

    /// Copy of the whole session.
    pub fn snapshot(&self) -> Session {
        self.state.read().session.clone()
    }
}

/// Sole writer of the session.
///
/// Every transition replaces user and tokens together, in memory and in
/// storage, so no reader ever observes a half-written session.
pub struct SessionStore {
    state: Arc<RwLock<State>>,
    storage: Arc<dyn KeyValueStore>,
    refresh_lock: AsyncMutex<()>,
}

impl SessionStore {
    /// Create an empty store in the loading state. Call [`restore`](Self::restore) next.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                session: Session::empty(),
                loading: true,
            })),
            storage,
            refresh_lock: AsyncMutex::new(()),
        }
    }

    /// Create the store and restore the persisted session.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let store = Self::new(storage);
        store.restore();
        store
    }

    /// Handle for consumers that only read the session.
    pub fn view(&self) -> SessionView {
        SessionView {
            state: Arc::clone(&self.state),
        }
    }

    /// Load the persisted session. Corrupt or partial data is wiped and the
    /// store comes up signed out; this never fails.
    pub fn restore(&self) -> Session {
        let session = match read_persisted(self.storage.as_ref()) {
            Ok(Some(session)) => {
                info!(
                    "restored session for {}",
                    session
                        .user
                        .as_ref()
                        .map(|user| user.id.as_str())
                        .unwrap_or("?")
                );
                session
            }
            Ok(None) => {
                debug!("no persisted session");
                Session::empty()
            }
            Err(reason) => {
                warn!("discarding persisted session: {reason}");
                if let Err(err) = self.storage.remove_many(&SESSION_KEYS) {
                    warn!("failed to clear persisted session: {err:#}");
                }
                Session::empty()
            }
        };

        let mut state = self.state.write();
        state.session = session.clone();
        state.loading = false;
        session
    }

    /// Sign in. On failure the current session is left exactly as it was.
    pub async fn login(
        &self,
        auth: &dyn AuthBackend,
        phone_number: &str,
        password: &str,
    ) -> Result<Identity, ApiError> {
        validation::phone_number(phone_number)?;
        if password.is_empty() {
            return Err(ValidationError::new("password", "is required").into());
        }

        let credentials = Credentials {
            phone_number: validation::normalize_phone(phone_number),
            password: password.to_string(),
        };
        let response = auth.login(&credentials).await.map_err(|err| {
            warn!("login failed: {err}");
            err
        })?;
        let identity = self.establish(response)?;
        info!("logged in as {}", identity.id);
        Ok(identity)
    }

    /// Create an account and sign it in, with the same guarantees as [`login`](Self::login).
    pub async fn register(
        &self,
        auth: &dyn AuthBackend,
        name: &str,
        phone_number: &str,
        password: &str,
        invitation_secret: &str,
    ) -> Result<Identity, ApiError> {
        validation::name("name", name)?;
        validation::phone_number(phone_number)?;
        validation::password(password)?;
        validation::name("secretKey", invitation_secret)?;

        let registration = Registration {
            name: name.trim().to_string(),
            phone_number: validation::normalize_phone(phone_number),
            password: password.to_string(),
            secret_key: invitation_secret.trim().to_string(),
        };
        let response = auth.register(&registration).await.map_err(|err| {
            warn!("registration failed: {err}");
            err
        })?;
        let identity = self.establish(response)?;
        info!("registered and logged in as {}", identity.id);
        Ok(identity)
    }

    /// Drop the session. Readers observe the empty session as soon as this returns.
    pub fn logout(&self) {
        let was_authenticated = {
            let mut state = self.state.write();
            let was = state.session.is_authenticated();
            state.session = Session::empty();
            was
        };
        if let Err(err) = self.storage.remove_many(&SESSION_KEYS) {
            warn!("failed to clear persisted session: {err:#}");
        }
        if was_authenticated {
            info!("logged out");
        }
    }

    /// Swap in an updated identity for the signed-in user.
    ///
    /// Returns `false` (and changes nothing) when nobody is signed in or the
    /// identity belongs to someone else.
    pub fn replace_user(&self, identity: Identity) -> Result<bool, ApiError> {
        let mut state = self.state.write();
        match &state.session.user {
            Some(current) if current.id == identity.id => {}
            _ => return Ok(false),
        }

        let serialised =
            serde_json::to_string(&identity).map_err(|err| ApiError::Decode(err.to_string()))?;
        if let Err(err) = self.storage.set(USER_KEY, &serialised) {
            warn!("failed to persist updated user: {err:#}");
        }
        state.session.user = Some(identity);
        Ok(true)
    }

    /// Obtain a new access token after `stale_token` was rejected.
    ///
    /// Refreshes are serialised; when another caller already replaced
    /// `stale_token` no request is made. A rejected or missing refresh token
    /// ends the session.
    pub async fn refresh(
        &self,
        auth: &dyn AuthBackend,
        stale_token: Option<&str>,
    ) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let (access_token, refresh_token) = {
            let state = self.state.read();
            (
                state.session.access_token.clone(),
                state.session.refresh_token.clone(),
            )
        };
        let Some(access_token) = access_token else {
            return Err(ApiError::Unauthenticated);
        };
        if stale_token.is_some_and(|stale| stale != access_token) {
            debug!("access token already refreshed");
            return Ok(());
        }
        let Some(refresh_token) = refresh_token else {
            warn!("access token rejected and no refresh token available");
            self.logout();
            return Err(ApiError::Unauthenticated);
        };

        let pair = match auth.refresh(&refresh_token).await {
            Ok(pair) => pair,
            Err(err) if err.is_auth_rejection() => {
                warn!("refresh token rejected: {err}");
                self.logout();
                return Err(ApiError::Unauthenticated);
            }
            Err(err) => return Err(err),
        };

        let mut state = self.state.write();
        if state.session.access_token.as_deref() != Some(access_token.as_str()) {
            // Logged out or replaced while the refresh was in flight.
            return Err(ApiError::Unauthenticated);
        }

        let next_refresh = pair.refresh_token.unwrap_or(refresh_token);
        if let Err(err) = self.storage.set_many(&[
            (ACCESS_TOKEN_KEY, pair.access_token.as_str()),
            (REFRESH_TOKEN_KEY, next_refresh.as_str()),
        ]) {
            warn!("failed to persist refreshed tokens: {err:#}");
        }
        state.session.access_token = Some(pair.access_token);
        state.session.refresh_token = Some(next_refresh);
        info!("access token refreshed");
        Ok(())
    }

    fn establish(&self, response: AuthResponse) -> Result<Identity, ApiError> {
        let AuthResponse {
            user,
            access_token,
            refresh_token,
        } = response;
        let serialised =
            serde_json::to_string(&user).map_err(|err| ApiError::Decode(err.to_string()))?;

        let mut state = self.state.write();
        let persisted = match refresh_token.as_deref() {
            Some(refresh) => self.storage.set_many(&[
                (USER_KEY, serialised.as_str()),
                (ACCESS_TOKEN_KEY, access_token.as_str()),
                (REFRESH_TOKEN_KEY, refresh),
            ]),
            None => self.storage.remove(REFRESH_TOKEN_KEY).and_then(|_| {
                self.storage.set_many(&[
                    (USER_KEY, serialised.as_str()),
                    (ACCESS_TOKEN_KEY, access_token.as_str()),
                ])
            }),
        };
        if let Err(err) = persisted {
            warn!("session will not survive a restart: {err:#}");
        }

        state.session = Session {
            user: Some(user.clone()),
            access_token: Some(access_token),
            refresh_token,
        };
        state.loading = false;
        Ok(user)
    }
}

fn read_persisted(storage: &dyn KeyValueStore) -> Result<Option<Session>, String> {
    let read = |key: &str| {
        storage
            .get(key)
            .map_err(|err| format!("failed to read {key}: {err:#}"))
    };
    let user = read(USER_KEY)?;
    let access_token = read(ACCESS_TOKEN_KEY)?;
    let refresh_token = read(REFRESH_TOKEN_KEY)?;

    match (user, access_token) {
        (None, None) if refresh_token.is_none() => Ok(None),
        (None, None) => Err("refresh token without a session".to_string()),
        (Some(raw_user), Some(access_token)) => {
            let user: Identity =
                serde_json::from_str(&raw_user).map_err(|err| format!("invalid user: {err}"))?;
            if access_token.trim().is_empty() {
                return Err("empty access token".to_string());
            }
            Ok(Some(Session {
                user: Some(user),
                access_token: Some(access_token),
                refresh_token,
            }))
        }
        (Some(_), None) => Err("user without an access token".to_string()),
        (None, Some(_)) => Err("access token without a user".to_string()),
    }
}
