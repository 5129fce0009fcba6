use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::Result,
    spotify::SpotifyClient,
    types::{
        AddTrackToPlaylistRequest, CreatePlaylistRequest, Paging, Playlist,
        RemoveTracksFromPlaylistRequest, SnapshotResponse, TrackUri, UpdatePlaylistRequest,
    },
};

impl SpotifyClient {
    /// Lists a user's playlists, defaulting to the authenticated user.
    pub async fn get_user_playlists(
        &self,
        user_id: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Playlist>> {
        let user = self.resolve_user_id(user_id).await?;
        let params = [("limit", limit.to_string()), ("offset", offset.to_string())];

        let page: Paging<Playlist> = self
            .request_as(Method::GET, &format!("/users/{user}/playlists"), &params, None)
            .await?;
        Ok(page.items)
    }

    pub async fn get_playlist(
        &self,
        playlist_id: &str,
        fields: Option<&str>,
        market: Option<&str>,
    ) -> Result<Playlist> {
        let mut params = Vec::new();
        if let Some(fields) = fields {
            params.push(("fields", fields.to_string()));
        }
        if let Some(market) = market {
            params.push(("market", market.to_string()));
        }

        self.request_as(
            Method::GET,
            &format!("/playlists/{playlist_id}"),
            &params,
            None,
        )
        .await
    }

    pub async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        public: bool,
        collaborative: bool,
        user_id: Option<&str>,
    ) -> Result<Playlist> {
        let user = self.resolve_user_id(user_id).await?;
        let body = serde_json::to_value(CreatePlaylistRequest {
            name: name.to_string(),
            description: description.filter(|d| !d.is_empty()).map(String::from),
            public,
            collaborative,
        })?;

        self.request_as(
            Method::POST,
            &format!("/users/{user}/playlists"),
            &[],
            Some(&body),
        )
        .await
    }

    /// Adds tracks by URI and returns the playlist's new snapshot id.
    pub async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
        position: Option<u32>,
    ) -> Result<String> {
        let body = serde_json::to_value(AddTrackToPlaylistRequest {
            uris: track_uris.to_vec(),
            position,
        })?;

        let response: SnapshotResponse = self
            .request_as(
                Method::POST,
                &format!("/playlists/{playlist_id}/tracks"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(response.snapshot_id)
    }

    /// Removes every occurrence of the given URIs and returns the new
    /// snapshot id.
    pub async fn remove_tracks_from_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
        snapshot_id: Option<&str>,
    ) -> Result<String> {
        let body = serde_json::to_value(RemoveTracksFromPlaylistRequest {
            tracks: track_uris
                .iter()
                .map(|uri| TrackUri { uri: uri.clone() })
                .collect(),
            snapshot_id: snapshot_id.map(String::from),
        })?;

        let response: SnapshotResponse = self
            .request_as(
                Method::DELETE,
                &format!("/playlists/{playlist_id}/tracks"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(response.snapshot_id)
    }

    /// Changes playlist details. Only the fields that are set get sent.
    pub async fn update_playlist(
        &self,
        playlist_id: &str,
        changes: UpdatePlaylistRequest,
    ) -> Result<()> {
        if changes.is_empty() {
            debug!(playlist_id, "no playlist fields to update");
            return Ok(());
        }
        let body = serde_json::to_value(changes)?;

        let _: Value = self
            .request(
                Method::PUT,
                &format!("/playlists/{playlist_id}"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }
}
