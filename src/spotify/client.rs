use std::{future::Future, sync::Arc, time::Duration};

use reqwest::{
    Client, Method, Response, StatusCode,
    header::{ACCEPT, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    management::TokenStore,
    spotify::auth::{AuthorizationPrompt, Authenticator, BrowserPrompt},
    utils,
};

/// Upper bound on sends per call: the original attempt plus one retry after
/// a token refresh.
const MAX_ATTEMPTS: usize = 2;
const MAX_IDLE_CONNECTIONS: usize = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Authenticated Spotify Web API client.
///
/// Every API call goes through [`SpotifyClient::request`], which makes sure a
/// token is available, attaches it as a bearer token, and on an HTTP 401
/// refreshes the token and retries the call exactly once.
pub struct SpotifyClient {
    config: Arc<Config>,
    auth: Authenticator,
}

impl SpotifyClient {
    /// Creates a client that opens the system browser for authorization.
    ///
    /// Fails with [`Error::Authorization`] if the configuration is invalid;
    /// no network activity happens before validation.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_prompt(config, BrowserPrompt)
    }

    pub fn with_prompt(config: Config, prompt: impl AuthorizationPrompt + 'static) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .build()?;

        let store = if config.cache_enabled {
            TokenStore::new(config.token_cache_path()).with_ttl(config.cache_ttl)
        } else {
            TokenStore::disabled()
        };

        let config = Arc::new(config);
        let auth = Authenticator::new(Arc::clone(&config), http, store, Arc::new(prompt));

        Ok(Self { config, auth })
    }

    /// Creates a client and authenticates it right away.
    pub async fn open(config: Config) -> Result<Self> {
        let client = Self::new(config)?;
        client.ensure_authenticated().await?;
        Ok(client)
    }

    /// Opens a session, runs `body` with it and closes it again, whether the
    /// body succeeded or not.
    pub async fn scoped<F, Fut, T>(config: Config, body: F) -> Result<T>
    where
        F: FnOnce(Arc<SpotifyClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        Arc::new(Self::new(config)?).session(body).await
    }

    /// Like [`SpotifyClient::scoped`] for an already constructed client.
    pub async fn session<F, Fut, T>(self: Arc<Self>, body: F) -> Result<T>
    where
        F: FnOnce(Arc<SpotifyClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = match self.ensure_authenticated().await {
            Ok(()) => body(Arc::clone(&self)).await,
            Err(e) => Err(e),
        };
        self.close().await;
        result
    }

    /// Closes the session. In-flight and later calls fail with
    /// [`Error::Closed`] and the connection pool is shut down. Calling it
    /// twice is harmless.
    pub async fn close(&self) {
        if !self.auth.is_closed() {
            debug!("closing spotify client");
        }
        self.auth.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.auth.is_closed()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub async fn ensure_authenticated(&self) -> Result<()> {
        self.auth.ensure_authenticated().await
    }

    pub async fn authenticate(&self, force_refresh: bool) -> Result<()> {
        self.auth.authenticate(force_refresh).await
    }

    pub async fn clear_auth_cache(&self) {
        self.auth.clear_auth_cache().await
    }

    /// Id of the authenticated user, once resolved.
    pub async fn user_id(&self) -> Option<String> {
        self.auth.user_id().await
    }

    /// Sends an authenticated request to the Web API and returns its JSON body.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method of the call
    /// * `path` - Path relative to the configured API base URL, or an absolute
    ///   URL under that base (e.g. a paging `next` link)
    /// * `query` - Query parameters, omitted when empty
    /// * `body` - JSON body, if any
    ///
    /// Successful responses without a body yield [`Value::Null`].
    ///
    /// A request that could not connect is sent again up to
    /// `Config::max_retries` times with exponential backoff. Timeouts are not
    /// resent since the server may already have applied the call.
    ///
    /// # Errors
    ///
    /// - [`Error::ForeignUrl`] when `path` is an absolute URL outside the API
    ///   base URL; nothing is sent
    /// - [`Error::Api`] for non-2xx responses, carrying the parsed error body
    ///   when there is one. A 401 is only returned after one refresh and retry
    /// - [`Error::Authorization`] / [`Error::AuthorizationTimeout`] when no
    ///   token can be obtained or refreshed
    /// - [`Error::Http`] for transport failures, once connection retries are
    ///   used up
    /// - [`Error::Closed`] when the client is closed before or during the call
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = utils::api_url(&self.config.api_base_url, path)?;
        self.auth.ensure_authenticated().await?;
        let http = self.auth.http().await?;

        let mut attempt = 1;
        let mut connect_failures = 0;
        loop {
            let token = self
                .auth
                .access_token()
                .await
                .ok_or_else(|| Error::Authorization("No access token available".into()))?;

            let mut request = http
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .header(ACCEPT, HeaderValue::from_static("application/json"));
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let sent = self
                .auth
                .until_closed(async { request.send().await.map_err(Error::from) })
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(Error::Http(e))
                    if e.is_connect() && connect_failures < self.config.max_retries =>
                {
                    connect_failures += 1;
                    let delay = RETRY_BASE_DELAY
                        .saturating_mul(2u32.saturating_pow(connect_failures - 1));
                    warn!(%method, path, error = %e, retry = connect_failures, "connection failed, retrying");
                    self.auth
                        .until_closed(async {
                            sleep(delay).await;
                            Ok(())
                        })
                        .await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            // only the first 401 of a call triggers a refresh
            if response.status() == StatusCode::UNAUTHORIZED && attempt < MAX_ATTEMPTS {
                attempt += 1;
                debug!(%method, path, "access token rejected, refreshing");
                self.auth.refresh_if_current(&token).await?;
                continue;
            }

            return self.auth.until_closed(read_response(response)).await;
        }
    }

    /// [`SpotifyClient::request`] decoding the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T> {
        let value = self.request(method, path, query, body).await?;
        Ok(serde_json::from_value(value)?)
    }
}

async fn read_response(response: Response) -> Result<Value> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turns a non-success response into [`Error::Api`].
pub(crate) async fn api_error(response: Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: Option<Value> = serde_json::from_str(&text).ok();

    let message = body
        .as_ref()
        .and_then(utils::error_message)
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .or_else(|| status.canonical_reason().map(String::from))
        .unwrap_or_else(|| "unknown error".to_string());

    Error::Api {
        status: status.as_u16(),
        message,
        body,
    }
}
