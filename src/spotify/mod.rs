//! # Spotify Integration Module
//!
//! This module provides the typed interface to the Spotify Web API: the
//! authorization-code flow, token lifecycle management, and the playlist,
//! track and user operations built on top of a single request primitive.
//!
//! ## Architecture
//!
//! ```text
//! Application Layer (CLI)
//!          ↓
//! Domain Operations (users, playlists, tracks)
//!          ↓
//! Request Engine (SpotifyClient::request)
//!     ├── ensure a token is held
//!     ├── bearer auth + JSON
//!     └── 401 → refresh → retry once
//!          ↓
//! Authenticator
//!     ├── Token Store (on-disk cache)
//!     ├── Local Callback Receiver (axum)
//!     └── Token endpoint (exchange / refresh)
//!          ↓
//! Spotify Accounts Service & Web API
//! ```
//!
//! ## Core Modules
//!
//! ### Authentication Module
//!
//! [`auth`] - Implements the OAuth 2.0 authorization-code grant with a client
//! secret:
//! - **Interactive Flow**: Builds the authorization URL with a fresh `state`,
//!   presents it through an [`AuthorizationPrompt`] and waits for the redirect
//! - **Token Exchange**: Trades the code for a token pair using HTTP Basic auth
//! - **Refresh**: Renews the access token, keeping the old refresh token when
//!   Spotify does not rotate it
//! - **Cache Verification**: Trusts a cached pair only after `/me` accepts it
//!
//! ### Request Engine
//!
//! [`client`] - [`SpotifyClient`] is the only path to the Web API. Each call
//! is sent at most twice: once with the current token and, after an HTTP 401,
//! once more with a refreshed token. A second 401 is reported as
//! [`crate::error::Error::Api`].
//!
//! ### Domain Operations
//!
//! - `users` - current user profile, country, catalog search
//! - `playlist` - list, fetch, create, update playlists; add and remove tracks
//! - `tracks` - fetch a track, track search
//!
//! ## Session Lifecycle
//!
//! ```rust,ignore
//! use spotiplay::{config::Config, spotify::SpotifyClient};
//!
//! let config = Config::from_env()?;
//! let playlists = SpotifyClient::scoped(config, |client| async move {
//!     client.get_user_playlists(None, 20, 0).await
//! })
//! .await?;
//! ```
//!
//! `scoped` authenticates first and always closes the client afterwards,
//! including when the body fails. Closing makes in-flight calls fail with
//! [`crate::error::Error::Closed`] instead of hanging.
//!
//! ## Thread Safety
//!
//! Token state lives behind an async mutex. Authentication and refresh are
//! serialized per client, while ordinary API calls only hold the lock long
//! enough to read the current token and can run concurrently on the pooled
//! HTTP connections.

pub mod auth;
pub mod client;
mod playlist;
mod tracks;
mod users;

pub use auth::{AuthorizationPrompt, Authenticator, BrowserPrompt};
pub use client::SpotifyClient;
