//! # CLI Module
//!
//! This module provides the command-line interface layer for Spotiplay. It
//! implements all user-facing commands and coordinates between the Spotify
//! client and user interaction components.
//!
//! ## Command Categories
//!
//! ### Authentication
//!
//! - [`auth`] - Runs the authorization-code flow (or reuses cached tokens)
//! - [`logout`] - Drops the cached tokens
//!
//! ### User Information
//!
//! - [`me`] - Shows the authenticated user's profile
//!
//! ### Playlist Operations
//!
//! - [`list_playlists`] - Lists a user's playlists
//! - [`show_playlist`] - Shows a playlist and its tracks
//! - [`create_playlist`] - Creates a playlist for the authenticated user
//! - [`add_tracks`] / [`remove_tracks`] - Changes playlist contents, in chunks of 100 URIs
//! - [`update_playlist`] - Renames a playlist or changes its visibility
//!
//! ### Track Operations
//!
//! - [`track`] - Shows a single track
//! - [`search`] - Searches the catalog for tracks
//!
//! ## Error Handling
//!
//! Commands report failures through the `error!` macro, which prints the error
//! and terminates the process with exit code 1. Long-running network calls
//! show a spinner while they are in flight.
//!
//! ## Usage Patterns
//!
//! ```bash
//! spotiplay auth                              # Authenticate with Spotify
//! spotiplay playlists                         # List your playlists
//! spotiplay playlist create "Road Trip"       # Create a playlist
//! spotiplay playlist add <id> spotify:track:4uLU6hMCjMI75M1A2tKUQC
//! spotiplay search "daft punk" --limit 5      # Find tracks
//! ```

mod auth;
mod info;
mod playlist;
mod tracks;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub use auth::auth;
pub use auth::logout;
pub use info::me;
pub use playlist::add_tracks;
pub use playlist::create_playlist;
pub use playlist::list_playlists;
pub use playlist::remove_tracks;
pub use playlist::show_playlist;
pub use playlist::update_playlist;
pub use tracks::search;
pub use tracks::track;

pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb
}
