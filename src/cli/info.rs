use crate::{cli::spinner, error, info, spotify::SpotifyClient};

/// Shows the profile of the authenticated user.
pub async fn me(client: &SpotifyClient) {
    let pb = spinner("Fetching user profile...");
    let user = client.get_current_user().await;
    pb.finish_and_clear();

    let user = match user {
        Ok(user) => user,
        Err(e) => error!("Failed to load user profile: {}", e),
    };

    info!("Id:           {}", user.id);
    info!(
        "Display name: {}",
        user.display_name.as_deref().unwrap_or("-")
    );
    info!("Email:        {}", user.email.as_deref().unwrap_or("-"));
    info!("Country:      {}", user.country.as_deref().unwrap_or("-"));
    info!("Product:      {}", user.product.as_deref().unwrap_or("-"));
    if let Some(followers) = user.followers {
        info!("Followers:    {}", followers.total);
    }
    if let Some(url) = user.external_urls.spotify {
        info!("Profile:      {}", url);
    }
}
