use reqwest::Method;

use crate::{
    error::Result,
    spotify::SpotifyClient,
    types::{SearchResult, User},
};

impl SpotifyClient {
    /// Fetches the profile of the authenticated user and remembers its id.
    pub async fn get_current_user(&self) -> Result<User> {
        let user: User = self.request_as(Method::GET, "/me", &[], None).await?;
        self.auth().set_user_id(user.id.clone()).await;
        Ok(user)
    }

    pub async fn get_user_country(&self) -> Result<Option<String>> {
        Ok(self.get_current_user().await?.country)
    }

    /// Resolves the user to act on: the explicit id, the session's user, the
    /// configured `SPOTIFY_USER_ID`, or finally a `/me` lookup.
    pub(crate) async fn resolve_user_id(&self, user_id: Option<&str>) -> Result<String> {
        if let Some(id) = user_id {
            return Ok(id.to_string());
        }
        if let Some(id) = self.user_id().await {
            return Ok(id);
        }
        if let Some(id) = self.config().user_id.clone() {
            return Ok(id);
        }
        Ok(self.get_current_user().await?.id)
    }

    /// Searches the catalog.
    ///
    /// `types` is a list such as `["track", "artist"]`; an empty list lets
    /// Spotify apply its default.
    pub async fn search(
        &self,
        query: &str,
        types: &[&str],
        market: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<SearchResult> {
        let mut params = vec![
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if !types.is_empty() {
            params.push(("type", types.join(",")));
        }
        if let Some(market) = market {
            params.push(("market", market.to_string()));
        }

        self.request_as(Method::GET, "/search", &params, None).await
    }
}
