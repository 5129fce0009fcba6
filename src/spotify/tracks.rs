use reqwest::Method;

use crate::{error::Result, spotify::SpotifyClient, types::Track};

impl SpotifyClient {
    pub async fn get_track(&self, track_id: &str) -> Result<Track> {
        self.request_as(Method::GET, &format!("/tracks/{track_id}"), &[], None)
            .await
    }

    /// Searches for tracks only, returning an empty list when nothing matched.
    pub async fn search_tracks(
        &self,
        query: &str,
        market: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Track>> {
        let result = self
            .search(query, &["track"], market, limit, offset)
            .await?;
        Ok(result.tracks.map(|page| page.items).unwrap_or_default())
    }
}
