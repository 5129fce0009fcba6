use tabled::Table;

use crate::{
    cli::{spinner, tracks::print_tracks},
    error, info,
    spotify::SpotifyClient,
    success,
    types::{PlaylistTableRow, Track, UpdatePlaylistRequest},
    warning,
};

/// Spotify accepts at most this many URIs per add/remove call.
const MAX_TRACKS_PER_REQUEST: usize = 100;

pub async fn list_playlists(
    client: &SpotifyClient,
    user_id: Option<String>,
    limit: u32,
    offset: u32,
) {
    let pb = spinner("Fetching playlists...");
    let result = client
        .get_user_playlists(user_id.as_deref(), limit, offset)
        .await;
    pb.finish_and_clear();

    let playlists = match result {
        Ok(playlists) => playlists,
        Err(e) => error!("Failed to load playlists: {}", e),
    };

    if playlists.is_empty() {
        warning!("No playlists found.");
        return;
    }

    let rows: Vec<PlaylistTableRow> = playlists.iter().map(PlaylistTableRow::from).collect();
    println!("{}", Table::new(rows));
}

pub async fn show_playlist(client: &SpotifyClient, playlist_id: &str, market: Option<String>) {
    let pb = spinner("Fetching playlist...");
    let result = client
        .get_playlist(playlist_id, None, market.as_deref())
        .await;
    pb.finish_and_clear();

    let playlist = match result {
        Ok(playlist) => playlist,
        Err(e) => error!("Failed to load playlist {}: {}", playlist_id, e),
    };

    info!("{} ({})", playlist.name, playlist.id);
    if let Some(description) = playlist.description.as_deref().filter(|d| !d.is_empty()) {
        info!("{}", description);
    }
    if let Some(owner) = &playlist.owner {
        info!(
            "Owner: {}",
            owner.display_name.as_deref().unwrap_or(&owner.id)
        );
    }

    let tracks: Vec<Track> = playlist
        .tracks
        .map(|page| page.items.into_iter().filter_map(|item| item.track).collect())
        .unwrap_or_default();

    if tracks.is_empty() {
        warning!("Playlist has no tracks.");
    } else {
        print_tracks(&tracks);
    }
}

pub async fn create_playlist(
    client: &SpotifyClient,
    name: &str,
    description: Option<String>,
    public: bool,
    collaborative: bool,
) {
    match client
        .create_playlist(name, description.as_deref(), public, collaborative, None)
        .await
    {
        Ok(playlist) => success!("Playlist '{}' created with id {}", playlist.name, playlist.id),
        Err(e) => error!("Failed to create playlist: {}", e),
    }
}

pub async fn add_tracks(
    client: &SpotifyClient,
    playlist_id: &str,
    uris: Vec<String>,
    position: Option<u32>,
) {
    let mut position = position;
    for chunk in uris.chunks(MAX_TRACKS_PER_REQUEST) {
        match client
            .add_tracks_to_playlist(playlist_id, chunk, position)
            .await
        {
            Ok(snapshot) => {
                success!("Added {} tracks (snapshot {})", chunk.len(), snapshot);
                position = position.map(|p| p + chunk.len() as u32);
            }
            Err(e) => error!("Failed to add tracks to playlist: {}", e),
        }
    }
}

pub async fn remove_tracks(client: &SpotifyClient, playlist_id: &str, uris: Vec<String>) {
    for chunk in uris.chunks(MAX_TRACKS_PER_REQUEST) {
        match client
            .remove_tracks_from_playlist(playlist_id, chunk, None)
            .await
        {
            Ok(snapshot) => success!("Removed {} tracks (snapshot {})", chunk.len(), snapshot),
            Err(e) => error!("Failed to remove tracks from playlist: {}", e),
        }
    }
}

pub async fn update_playlist(
    client: &SpotifyClient,
    playlist_id: &str,
    changes: UpdatePlaylistRequest,
) {
    if changes.is_empty() {
        warning!("Nothing to update.");
        return;
    }

    match client.update_playlist(playlist_id, changes).await {
        Ok(()) => success!("Playlist {} updated.", playlist_id),
        Err(e) => error!("Failed to update playlist: {}", e),
    }
}
