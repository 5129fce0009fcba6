//! Configuration management for the Spotify playlist client.
//!
//! This module handles loading and validating configuration values from
//! environment variables and `.env` files. It provides a single [`Config`]
//! value holding the Spotify API credentials, redirect target, scopes, endpoint
//! URLs, HTTP timeouts and token cache settings.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the working directory
//! 3. `.env` file in the local data directory
//! 4. Application defaults (where applicable)

use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/callback";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Scopes required for reading and modifying the user's playlists.
pub const DEFAULT_SCOPES: &[&str] = &[
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-read-private",
    "user-read-email",
];

/// Loads `.env` files into the process environment.
///
/// Looks for a `.env` file in the working directory first and then in the
/// application's local data directory (`<data_local_dir>/spotiplay/.env`).
/// Variables that are already set are never overwritten, and missing files are
/// not an error.
pub async fn load_env() -> std::result::Result<(), String> {
    let _ = dotenv::dotenv();

    let path = app_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Directory holding the application's local state (`.env`, token cache).
pub fn app_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotiplay");
    path
}

/// Host, port and path the local callback receiver listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl RedirectTarget {
    /// Socket address string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Spotify client configuration.
///
/// Credentials are trimmed on construction. Use [`Config::validate`] (called
/// by the client constructor) to reject empty credentials or a malformed
/// redirect URI before any network activity happens.
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub user_id: Option<String>,
    pub scopes: Vec<String>,
    pub api_base_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub timeout: Duration,
    /// How often a request that could not connect is sent again.
    pub max_retries: u32,
    pub callback_timeout: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_path: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("user_id", &self.user_id)
            .field("scopes", &self.scopes)
            .field("api_base_url", &self.api_base_url)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("callback_timeout", &self.callback_timeout)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_path", &self.cache_path)
            .finish()
    }
}

impl Config {
    /// Creates a configuration with default endpoints, scopes and timeouts.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into().trim().to_string(),
            client_secret: client_secret.into().trim().to_string(),
            redirect_uri: redirect_uri.into().trim().to_string(),
            user_id: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            api_base_url: DEFAULT_API_URL.to_string(),
            authorize_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            callback_timeout: Duration::from_secs(300),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            cache_path: None,
        }
    }

    /// Builds a configuration from `SPOTIFY_*` environment variables.
    ///
    /// Call [`load_env`] beforehand to pick up `.env` files. Missing
    /// credentials become empty strings and are rejected by [`Config::validate`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            env::var("SPOTIFY_CLIENT_ID").unwrap_or_default(),
            env::var("SPOTIFY_CLIENT_SECRET").unwrap_or_default(),
            env::var("SPOTIFY_REDIRECT_URI").unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),
        );

        config.user_id = env::var("SPOTIFY_USER_ID").ok().filter(|v| !v.trim().is_empty());

        if let Ok(scopes) = env::var("SPOTIFY_SCOPES") {
            config.scopes = scopes
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(url) = env::var("SPOTIFY_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = env::var("SPOTIFY_AUTH_URL") {
            config.authorize_url = url;
        }
        if let Ok(url) = env::var("SPOTIFY_TOKEN_URL") {
            config.token_url = url;
        }

        config.cache_enabled = env::var("SPOTIFY_CACHE_ENABLED")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        config.cache_ttl = Duration::from_secs(env_number("SPOTIFY_CACHE_TTL", 3600)?);
        config.cache_path = env::var("SPOTIFY_CACHE_PATH").ok().map(PathBuf::from);
        config.timeout = Duration::from_secs(env_number("SPOTIFY_TIMEOUT", 30)?);
        config.max_retries = env_number("SPOTIFY_MAX_RETRIES", 3)?;
        config.callback_timeout = Duration::from_secs(env_number("SPOTIFY_CALLBACK_TIMEOUT", 300)?);

        Ok(config)
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Rejects empty credentials and non-HTTP(S) redirect URIs.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(Error::invalid_config(
                "Client ID and Client Secret cannot be empty",
            ));
        }
        self.redirect_target()?;
        Ok(())
    }

    /// Scopes joined with single spaces, as the authorize endpoint expects.
    pub fn scopes_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Splits the redirect URI into the address the callback receiver binds.
    pub fn redirect_target(&self) -> Result<RedirectTarget> {
        let url = Url::parse(&self.redirect_uri)
            .map_err(|e| Error::invalid_config(format!("redirect URI: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_config(
                "Redirect URI must be a valid HTTP/HTTPS URL",
            ));
        }

        let host = match url.host_str() {
            Some(h) => h.trim_start_matches('[').trim_end_matches(']').to_string(),
            None => "127.0.0.1".to_string(),
        };
        let port = url.port_or_known_default().unwrap_or(8000);
        let path = match url.path() {
            "" | "/" => "/callback".to_string(),
            p => p.to_string(),
        };

        Ok(RedirectTarget { host, port, path })
    }

    /// Token cache file location, honoring an explicit override.
    pub fn token_cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(crate::management::TokenStore::default_path)
    }
}

fn env_number<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::invalid_config(format!("{key} must be a number, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}
