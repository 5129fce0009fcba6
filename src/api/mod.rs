//! # API Module
//!
//! HTTP endpoints served by the local callback receiver while an authorization
//! attempt is in flight.
//!
//! - [`callback`] - Handles the redirect from Spotify's authorization server.
//!   It records either the authorization code or the reported error (together
//!   with the `state` parameter) into a shared [`CallbackSlot`] and answers the
//!   browser with a short HTML acknowledgement. Requests carrying neither a
//!   `code` nor an `error` get an "invalid callback" page and record nothing.
//!
//! ```rust,ignore
//! use axum::{Extension, Router, routing::get};
//! use spotiplay::api::{CallbackSlot, callback};
//!
//! let slot = CallbackSlot::default();
//! let app = Router::new().route("/callback", get(callback).layer(Extension(slot)));
//! ```

mod callback;

pub use callback::{CallbackSlot, callback};
