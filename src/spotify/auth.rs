use std::{future::Future, sync::Arc};

use reqwest::{Client, Response, StatusCode};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    info,
    management::TokenStore,
    server::CallbackServer,
    spotify::client::api_error,
    types::{TokenPair, TokenResponse, User},
    utils, warning,
};

/// Presents the authorization URL to the user.
///
/// The default [`BrowserPrompt`] prints the URL and opens it in the system
/// browser. Headless callers can plug in their own implementation, e.g. one
/// that forwards the URL to another device.
pub trait AuthorizationPrompt: Send + Sync {
    fn present(&self, url: &str) -> Result<()>;
}

/// Prints the URL and tries to open it in the default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPrompt;

impl AuthorizationPrompt for BrowserPrompt {
    fn present(&self, url: &str) -> Result<()> {
        info!("Opening browser for Spotify authorization...");
        info!("If the browser doesn't open, visit: {}", url);

        if webbrowser::open(url).is_err() {
            warning!("Failed to open browser. Please navigate to the URL above manually.");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AuthState {
    tokens: Option<TokenPair>,
    user_id: Option<String>,
}

/// Produces and maintains the session's token pair.
///
/// All state transitions (loading the cache, the interactive flow, refreshing)
/// run under one async mutex, so concurrent callers never refresh the same
/// token twice or interleave two authorization attempts.
pub struct Authenticator {
    config: Arc<Config>,
    http: Mutex<Option<Client>>,
    store: TokenStore,
    prompt: Arc<dyn AuthorizationPrompt>,
    state: Mutex<AuthState>,
    shutdown: watch::Sender<bool>,
}

impl Authenticator {
    pub fn new(
        config: Arc<Config>,
        http: Client,
        store: TokenStore,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            http: Mutex::new(Some(http)),
            store,
            prompt,
            state: Mutex::new(AuthState::default()),
            shutdown,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Handle to the shared HTTP client; [`Error::Closed`] once released.
    pub(crate) async fn http(&self) -> Result<Client> {
        self.http.lock().await.clone().ok_or(Error::Closed)
    }

    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.tokens.as_ref().map(|t| t.access_token.clone())
    }

    pub async fn tokens(&self) -> Option<TokenPair> {
        self.state.lock().await.tokens.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.tokens.is_some()
    }

    /// Id of the authenticated user, once resolved.
    pub async fn user_id(&self) -> Option<String> {
        self.state.lock().await.user_id.clone()
    }

    pub(crate) async fn set_user_id(&self, user_id: String) {
        self.state.lock().await.user_id = Some(user_id);
    }

    /// Makes sure an access token is held in memory.
    ///
    /// Uses the cached pair when there is one, verifying it against `/me`
    /// (refreshing once if the access token has expired, or up front when the
    /// cache entry is older than the cache TTL). A cached pair that
    /// cannot be verified is thrown away and the interactive flow runs instead.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        self.check_open()?;
        let mut state = self.state.lock().await;
        if state.tokens.is_some() {
            return Ok(());
        }

        if let Some(entry) = self.store.load_entry().await {
            state.tokens = Some(entry.pair);
            match self.verify_cached(&mut state, entry.expired).await {
                Ok(()) => {
                    debug!("using cached tokens");
                    return Ok(());
                }
                Err(Error::Closed) => return Err(Error::Closed),
                Err(e) => {
                    tracing::info!(error = %e, "cached token is invalid, re-authenticating");
                    state.tokens = None;
                    state.user_id = None;
                    self.store.clear().await;
                }
            }
        }

        self.authenticate_locked(&mut state).await
    }

    /// Runs the interactive authorization-code flow with Spotify.
    ///
    /// Does nothing when a token is already held, unless `force_refresh` is
    /// set.
    ///
    /// # Authentication Flow
    ///
    /// 1. **State**: Generates a fresh single-use anti-forgery `state` value
    /// 2. **Server Start**: Binds the local callback receiver on the redirect address
    /// 3. **Prompt**: Presents the authorization URL (browser launch by default)
    /// 4. **Callback**: Waits up to the configured callback timeout for the redirect
    /// 5. **Teardown**: Stops the receiver whether or not a code arrived
    /// 6. **Token Exchange**: Trades the code for a token pair using HTTP Basic auth
    /// 7. **Persistence**: Saves the pair to the token cache
    /// 8. **Identity**: Resolves the authenticated user's id via `/me`
    ///
    /// # Errors
    ///
    /// - [`Error::Authorization`] when Spotify reports an error on the callback
    ///   or rejects the token exchange
    /// - [`Error::AuthorizationTimeout`] when no callback arrives in time
    /// - [`Error::Io`] when the redirect address cannot be bound
    ///
    /// None of these are retried; the caller decides whether to try again.
    pub async fn authenticate(&self, force_refresh: bool) -> Result<()> {
        self.check_open()?;
        let mut state = self.state.lock().await;
        if state.tokens.is_some() && !force_refresh {
            return Ok(());
        }
        self.authenticate_locked(&mut state).await
    }

    /// Trades the refresh token for a new access token.
    pub async fn refresh(&self) -> Result<()> {
        self.check_open()?;
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    /// Refreshes only if `stale_access_token` is still the one held.
    ///
    /// Lets several requests that were rejected with the same token share a
    /// single refresh.
    pub async fn refresh_if_current(&self, stale_access_token: &str) -> Result<()> {
        self.check_open()?;
        let mut state = self.state.lock().await;
        let current = state.tokens.as_ref().map(|t| t.access_token.as_str());
        if current.is_some() && current != Some(stale_access_token) {
            debug!("access token already rotated by a concurrent refresh");
            return Ok(());
        }
        self.refresh_locked(&mut state).await
    }

    /// Forgets the tokens in memory and deletes the cache file.
    pub async fn clear_auth_cache(&self) {
        let mut state = self.state.lock().await;
        state.tokens = None;
        state.user_id = None;
        self.store.clear().await;
        tracing::info!("authentication cache cleared");
    }

    /// Ends the session: pending operations fail with [`Error::Closed`], the
    /// tokens are dropped from memory and the HTTP client is released, which
    /// shuts its idle connections down. The cache file is left in place.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        if self.http.lock().await.take().is_some() {
            debug!("released http client");
        }
        let mut state = self.state.lock().await;
        state.tokens = None;
        state.user_id = None;
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Drives `fut` unless the session gets closed first.
    pub(crate) async fn until_closed<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut closed = self.shutdown.subscribe();
        self.check_open()?;
        tokio::select! {
            res = fut => res,
            _ = closed.wait_for(|c| *c) => Err(Error::Closed),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    async fn authenticate_locked(&self, state: &mut AuthState) -> Result<()> {
        let target = self.config.redirect_target()?;
        let auth_state = utils::generate_state();
        let auth_url = utils::build_authorize_url(&self.config, &auth_state)?;

        let mut server = CallbackServer::new(target);
        server.start().await?;
        let outcome = self.await_code(&server, &auth_url, &auth_state).await;
        server.stop().await;
        let code = outcome?;

        let pair = self.exchange_code(&code).await?;
        self.store.save(&pair).await;
        state.user_id = None;
        state.tokens = Some(pair);
        tracing::info!("obtained access token");

        let user = self.fetch_current_user(&self.current_token(state)?).await?;
        state.user_id = Some(user.id);
        Ok(())
    }

    async fn await_code(&self, server: &CallbackServer, url: &str, expected: &str) -> Result<String> {
        self.prompt.present(url)?;
        self.until_closed(server.wait_for_result(expected, self.config.callback_timeout))
            .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenPair> {
        let request = self
            .http()
            .await?
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ]);

        let token = self
            .until_closed(async {
                let response = request.send().await?;
                read_token_response(response, "Token exchange failed").await
            })
            .await?;
        Ok(token.into())
    }

    async fn refresh_locked(&self, state: &mut AuthState) -> Result<()> {
        let refresh_token = state
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| Error::Authorization("No refresh token available".into()))?;

        let request = self
            .http()
            .await?
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ]);

        let token = self
            .until_closed(async {
                let response = request.send().await?;
                read_token_response(response, "Token refresh failed").await
            })
            .await?;

        let pair = state
            .tokens
            .get_or_insert_with(|| TokenPair::new(String::new(), Some(refresh_token)));
        pair.apply_refresh(token);
        self.store.save(pair).await;
        tracing::info!("refreshed access token");
        Ok(())
    }

    async fn verify_cached(&self, state: &mut AuthState, expired: bool) -> Result<()> {
        if expired {
            debug!("cached access token outlived the cache TTL, refreshing");
            self.refresh_locked(state).await?;
        }

        let token = self.current_token(state)?;
        let user = match self.fetch_current_user(&token).await {
            Err(e) if !expired && e.status() == Some(StatusCode::UNAUTHORIZED.as_u16()) => {
                debug!("cached access token expired, refreshing");
                self.refresh_locked(state).await?;
                self.fetch_current_user(&self.current_token(state)?).await?
            }
            other => other?,
        };
        state.user_id = Some(user.id);
        Ok(())
    }

    fn current_token(&self, state: &AuthState) -> Result<String> {
        state
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| Error::Authorization("No access token available".into()))
    }

    async fn fetch_current_user(&self, access_token: &str) -> Result<User> {
        let url = utils::api_url(&self.config.api_base_url, "/me")?;
        let request = self.http().await?.get(url).bearer_auth(access_token);

        self.until_closed(async {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }
            Ok(response.json::<User>().await?)
        })
        .await
    }
}

async fn read_token_response(response: Response, context: &str) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "{context}");
        return Err(Error::Authorization(format!("{context}: {body}")));
    }
    Ok(response.json::<TokenResponse>().await?)
}
