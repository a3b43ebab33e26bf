//! HTTP client for the inventory API.

mod auth;
mod inventory;
mod users;

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    error::{ApiError, GENERIC_FAILURE},
    session::SessionView,
};

/// Thin JSON client. Attaches `Authorization: Bearer` whenever the session
/// holds an access token; knows nothing about caching.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    session: Option<SessionView>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<ErrorMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ApiClient {
    /// Client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|err| ApiError::Network(format!("invalid API base URL '{base_url}': {err}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Network(format!(
                "invalid API base URL '{base_url}'"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base,
            session: None,
        })
    }

    /// Client configured from [`AppConfig`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    /// Read bearer tokens from `session` from now on.
    pub fn with_session(mut self, session: SessionView) -> Self {
        self.session = Some(session);
        self
    }

    /// Base URL every path is appended to.
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("{method} {url}");
        let builder = self.http.request(method, url);
        match self.session.as_ref().and_then(SessionView::access_token) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn get<T>(&self, segments: &[&str]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        decode(self.request(Method::GET, segments)).await
    }

    pub(crate) async fn get_with_query<T, Q>(&self, segments: &[&str], query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        decode(self.request(Method::GET, segments).query(query)).await
    }

    pub(crate) async fn send_json<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        decode(self.request(method, segments).json(body)).await
    }

    /// Like [`send_json`](Self::send_json) but discards the response body.
    pub(crate) async fn send_unit<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let builder = self.request(method, segments);
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        execute(builder).await.map(|_| ())
    }
}

async fn execute(builder: RequestBuilder) -> Result<Response, ApiError> {
    let response = builder.send().await.map_err(|err| {
        warn!("request failed: {err}");
        ApiError::Network(err.to_string())
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
    debug!("request rejected with {status}: {message}");
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T>(builder: RequestBuilder) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let response = execute(builder).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| ApiError::Decode(err.to_string()))
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed.message {
        Some(ErrorMessage::One(message)) => message,
        Some(ErrorMessage::Many(messages)) => messages.join(", "),
        None => parsed.error?,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        models::{Shoe, ShoeFilter},
        session::SessionStore,
        storage::{KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY, USER_KEY},
    };

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5))
            .expect("valid client")
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(
            error_message(r#"{"message":"Phone number already registered"}"#).as_deref(),
            Some("Phone number already registered")
        );
        assert_eq!(
            error_message(r#"{"message":["price must be positive","name is required"]}"#)
                .as_deref(),
            Some("price must be positive, name is required")
        );
        assert_eq!(
            error_message(r#"{"error":"Forbidden"}"#).as_deref(),
            Some("Forbidden")
        );
        assert_eq!(error_message("<html>502</html>"), None);
        assert_eq!(error_message(r#"{"message":"  "}"#), None);
    }

    #[test]
    fn encodes_path_segments() {
        let client = ApiClient::new("http://localhost:3000/api", Duration::from_secs(1))
            .expect("valid client");
        let url = client.endpoint(&["shoes", "a/b c"]);
        assert_eq!(url.as_str(), "http://localhost:3000/api/shoes/a%2Fb%20c");
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn attaches_bearer_token_from_session() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/shoes"))
            .and(query_param("search", "nike"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "s1", "name": "Air", "brand": "Nike", "price": 80.0 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStore::new());
        storage.set_many(&[(USER_KEY, r#"{"id":"u1"}"#), (ACCESS_TOKEN_KEY, "tok")])?;
        let session = SessionStore::open(storage);
        let api = client(&server).with_session(session.view());

        let shoes: Vec<Shoe> = api
            .list_shoes(&ShoeFilter {
                search: Some("nike".to_string()),
            })
            .await?;
        assert_eq!(shoes.len(), 1);
        assert_eq!(shoes[0].display_name(), "Nike Air");
        Ok(())
    }

    #[tokio::test]
    async fn surfaces_server_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/exchange-rate"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({ "message": "Admins only" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/suppliers"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = client(&server);
        let err = api.exchange_rate().await.expect_err("forbidden");
        assert!(matches!(err, ApiError::Server { status: 403, ref message } if message == "Admins only"));

        let err = api.list_suppliers().await.expect_err("server error");
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn reports_unexpected_bodies_as_decode_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/exchange-rate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 1 })))
            .mount(&server)
            .await;

        let err = client(&server)
            .exchange_rate()
            .await
            .expect_err("missing rate");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        let api = ApiClient::new(&format!("http://127.0.0.1:{port}/api"), Duration::from_secs(5))?;

        let err = api.list_suppliers().await.expect_err("nothing listening");
        assert!(matches!(err, ApiError::Network(_)));
        Ok(())
    }
}
