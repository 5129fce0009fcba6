use tabled::Table;

use crate::{
    cli::spinner,
    error, info,
    spotify::SpotifyClient,
    types::{Track, TrackTableRow},
    warning,
};

pub async fn track(client: &SpotifyClient, track_id: &str) {
    let pb = spinner("Fetching track...");
    let result = client.get_track(track_id).await;
    pb.finish_and_clear();

    match result {
        Ok(track) => print_tracks(&[track]),
        Err(e) => error!("Failed to load track {}: {}", track_id, e),
    }
}

pub async fn search(client: &SpotifyClient, query: &str, market: Option<String>, limit: u32) {
    let pb = spinner("Searching tracks...");
    let result = client
        .search_tracks(query, market.as_deref(), limit, 0)
        .await;
    pb.finish_and_clear();

    match result {
        Ok(tracks) if tracks.is_empty() => warning!("No tracks found for '{}'", query),
        Ok(tracks) => {
            print_tracks(&tracks);
            info!("{} tracks found", tracks.len());
        }
        Err(e) => error!("Search failed: {}", e),
    }
}

pub(crate) fn print_tracks(tracks: &[Track]) {
    let rows: Vec<TrackTableRow> = tracks.iter().map(TrackTableRow::from).collect();
    println!("{}", Table::new(rows));
}
