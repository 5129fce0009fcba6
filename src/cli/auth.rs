use crate::{error, info, spotify::SpotifyClient, success};

/// Runs the interactive authorization flow and caches the resulting tokens.
///
/// Without `force` a valid cached token is reused and the browser is only
/// opened when there is none. With `force` a fresh authorization is always
/// requested, replacing the cached pair.
pub async fn auth(client: &SpotifyClient, force: bool) {
    let result = if force {
        client.authenticate(true).await
    } else {
        client.ensure_authenticated().await
    };

    if let Err(e) = result {
        error!("Authentication failed: {}", e);
    }

    match client.user_id().await {
        Some(user_id) => success!("Authenticated as {}", user_id),
        None => success!("Authentication successful!"),
    }
}

/// Forgets the cached tokens so the next command authorizes again.
pub async fn logout(client: &SpotifyClient) {
    client.clear_auth_cache().await;
    match client.auth().store().path() {
        Some(path) => info!("Removed token cache at {}", path.display()),
        None => info!("Token cache is disabled"),
    }
    success!("Logged out.");
}
