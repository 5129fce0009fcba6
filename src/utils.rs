use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use url::Url;

use crate::{
    config::Config,
    error::{Error, Result},
};

/// Number of random bytes behind an authorization state value.
pub const STATE_BYTES: usize = 32;

/// Generates a fresh anti-forgery `state` value.
///
/// 32 bytes from the thread-local CSPRNG, URL-safe base64 without padding,
/// which yields 43 characters from `[A-Za-z0-9_-]`.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Builds the URL the user visits to grant access.
pub fn build_authorize_url(config: &Config, state: &str) -> Result<String> {
    let scope = config.scopes_string();
    let url = Url::parse_with_params(
        &config.authorize_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("state", state),
            ("scope", scope.as_str()),
        ],
    )
    .map_err(|e| Error::invalid_config(format!("authorize URL: {e}")))?;

    Ok(url.into())
}

/// Joins the API base URL and an endpoint path with exactly one slash.
///
/// Absolute URLs, such as paging links, pass through only when they live under
/// `base`; the bearer token is never sent to any other host.
pub fn api_url(base: &str, path: &str) -> Result<String> {
    let base = base.trim_end_matches('/');
    if path.starts_with("http://") || path.starts_with("https://") {
        let under_base = path
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']));
        if !under_base {
            return Err(Error::ForeignUrl(path.to_string()));
        }
        return Ok(path.to_string());
    }
    Ok(format!("{}/{}", base, path.trim_start_matches('/')))
}

/// Pulls a human readable message out of a Spotify error body.
///
/// Handles both the Web API shape `{"error": {"status", "message"}}` and the
/// accounts service shape `{"error": "...", "error_description": "..."}`.
pub fn error_message(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;
    if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    let code = error.as_str()?;
    match body.get("error_description").and_then(|d| d.as_str()) {
        Some(description) => Some(format!("{code}: {description}")),
        None => Some(code.to_string()),
    }
}
