#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
    },
    time::Duration,
};

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{Path as UrlPath, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use spotiplay::{config::Config, spotify::AuthorizationPrompt};
use url::Url;

pub const CLIENT_ID: &str = "abc";
pub const CLIENT_SECRET: &str = "def";
pub const USER_ID: &str = "user123";

/// Everything the fake Spotify server observed, plus knobs to change its
/// behavior mid-test.
#[derive(Default)]
pub struct FakeState {
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub token_forms: Mutex<Vec<HashMap<String, String>>>,
    pub token_auth_headers: Mutex<Vec<String>>,
    pub access_tokens: Mutex<HashSet<String>>,
    pub refresh_tokens: Mutex<HashSet<String>>,
    pub rotate_refresh_token: AtomicBool,
    pub omit_refresh_token: AtomicBool,
    pub reject_exchange: AtomicBool,
    pub scripted: Mutex<VecDeque<(u16, Value)>>,
    pub scripted_tokens: Mutex<Vec<String>>,
    pub bodies: Mutex<Vec<(String, Value)>>,
    pub queries: Mutex<Vec<(String, HashMap<String, String>)>>,
    counter: AtomicUsize,
}

impl FakeState {
    pub fn issue_access_token(&self) -> String {
        let token = format!("access-{}", self.counter.fetch_add(1, SeqCst) + 1);
        self.access_tokens.lock().unwrap().insert(token.clone());
        token
    }

    pub fn issue_refresh_token(&self) -> String {
        let token = format!("refresh-{}", self.counter.fetch_add(1, SeqCst) + 1);
        self.refresh_tokens.lock().unwrap().insert(token.clone());
        token
    }

    /// Makes every access token issued so far invalid.
    pub fn expire_access_tokens(&self) {
        self.access_tokens.lock().unwrap().clear();
    }

    pub fn script(&self, responses: impl IntoIterator<Item = (u16, Value)>) {
        self.scripted.lock().unwrap().extend(responses);
    }

    pub fn last_body(&self, key: &str) -> Option<Value> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn last_query(&self, key: &str) -> Option<HashMap<String, String>> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|t| self.access_tokens.lock().unwrap().contains(&t))
    }

    fn record_body(&self, key: String, body: Value) {
        self.bodies.lock().unwrap().push((key, body));
    }

    fn record_query(&self, key: &str, query: HashMap<String, String>) {
        self.queries.lock().unwrap().push((key.to_string(), query));
    }
}

pub struct FakeSpotify {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
}

impl FakeSpotify {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Client configuration pointing every endpoint at this server.
    pub fn config(&self, redirect_port: u16, cache_dir: &Path) -> Config {
        Config::new(
            CLIENT_ID,
            CLIENT_SECRET,
            format!("http://127.0.0.1:{redirect_port}/callback"),
        )
        .with_api_base_url(self.url("/v1"))
        .with_token_url(self.url("/api/token"))
        .with_authorize_url(self.url("/authorize"))
        .with_scopes(["playlist-read-private", "user-read-private"])
        .with_callback_timeout(Duration::from_secs(5))
        .with_timeout(Duration::from_secs(5))
        .with_cache_path(cache_dir.join("token.json"))
    }
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Plays the user's browser: records the authorization URL and immediately
/// follows the redirect with a code and the URL's `state`.
#[derive(Clone, Default)]
pub struct CallbackPrompt {
    pub code: String,
    pub error: Option<String>,
    pub presented: Arc<Mutex<Vec<String>>>,
}

impl CallbackPrompt {
    pub fn with_code(code: &str) -> Self {
        Self {
            code: code.to_string(),
            ..Default::default()
        }
    }

    pub fn with_error(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn presented(&self) -> Vec<String> {
        self.presented.lock().unwrap().clone()
    }
}

impl AuthorizationPrompt for CallbackPrompt {
    fn present(&self, url: &str) -> spotiplay::Result<()> {
        self.presented.lock().unwrap().push(url.to_string());

        let parsed = Url::parse(url).unwrap();
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        let redirect_uri = params["redirect_uri"].clone();
        let state = params["state"].clone();

        let (key, value) = match &self.error {
            Some(error) => ("error", error.as_str()),
            None => ("code", self.code.as_str()),
        };
        let callback =
            Url::parse_with_params(&redirect_uri, &[(key, value), ("state", state.as_str())])
                .unwrap();

        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok(())
    }
}

/// Records the URL and never answers, like a user who walked away.
#[derive(Clone, Default)]
pub struct SilentPrompt {
    pub presented: Arc<Mutex<Vec<String>>>,
}

impl AuthorizationPrompt for SilentPrompt {
    fn present(&self, url: &str) -> spotiplay::Result<()> {
        self.presented.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn write_cache(dir: &Path, access_token: &str, refresh_token: &str) {
    let body = json!({"access_token": access_token, "refresh_token": refresh_token});
    std::fs::write(dir.join("token.json"), body.to_string()).unwrap();
}

pub fn read_cache(dir: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(dir.join("token.json")).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn user_json() -> Value {
    json!({
        "id": USER_ID,
        "display_name": "Test User",
        "country": "SE",
        "email": "test@example.com",
        "external_urls": {"spotify": format!("https://open.spotify.com/user/{USER_ID}")},
        "href": format!("https://api.spotify.com/v1/users/{USER_ID}"),
        "uri": format!("spotify:user:{USER_ID}"),
    })
}

pub fn track_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Test Track",
        "album": {
            "id": "album1",
            "name": "Test Album",
            "album_type": "album",
            "artists": [{"id": "artist1", "name": "Test Artist"}],
            "release_date": "2023-01-01",
            "release_date_precision": "day",
            "uri": "spotify:album:album1"
        },
        "artists": [
            {"id": "artist1", "name": "Test Artist", "uri": "spotify:artist:artist1"},
            {"id": "artist2", "name": "Other Artist", "uri": "spotify:artist:artist2"}
        ],
        "disc_number": 1,
        "duration_ms": 185000,
        "explicit": false,
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{id}")},
        "is_local": false,
        "popularity": 50,
        "track_number": 1,
        "uri": format!("spotify:track:{id}")
    })
}

pub fn playlist_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": "",
        "collaborative": false,
        "public": true,
        "owner": user_json(),
        "snapshot_id": "snap-0",
        "external_urls": {"spotify": format!("https://open.spotify.com/playlist/{id}")},
        "tracks": {
            "href": format!("https://api.spotify.com/v1/playlists/{id}/tracks"),
            "items": [{
                "added_at": "2023-01-01T00:00:00Z",
                "added_by": user_json(),
                "is_local": false,
                "track": track_json("track1")
            }],
            "limit": 100,
            "offset": 0,
            "total": 1
        },
        "uri": format!("spotify:playlist:{id}")
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(String::from)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
    )
        .into_response()
}

fn invalid_grant(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "invalid_grant", "error_description": description})),
    )
        .into_response()
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/api/token", post(token))
        .route("/v1/me", get(me))
        .route("/v1/scripted", get(scripted).post(scripted))
        .route(
            "/v1/users/{user}/playlists",
            get(list_playlists).post(create_playlist),
        )
        .route("/v1/playlists/{id}", get(get_playlist).put(update_playlist))
        .route(
            "/v1/playlists/{id}/tracks",
            post(add_tracks).delete(remove_tracks),
        )
        .route("/v1/tracks/{id}", get(get_track))
        .route("/v1/search", get(search))
        .with_state(state)
}

async fn token(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    s.token_auth_headers.lock().unwrap().push(auth);
    s.token_forms.lock().unwrap().push(form.clone());

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            s.exchange_calls.fetch_add(1, SeqCst);
            if s.reject_exchange.load(SeqCst) {
                return invalid_grant("Invalid authorization code");
            }
            let mut body = json!({
                "access_token": s.issue_access_token(),
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "playlist-read-private user-read-private"
            });
            if !s.omit_refresh_token.load(SeqCst) {
                body["refresh_token"] = json!(s.issue_refresh_token());
            }
            Json(body).into_response()
        }
        Some("refresh_token") => {
            s.refresh_calls.fetch_add(1, SeqCst);
            let known = form
                .get("refresh_token")
                .is_some_and(|t| s.refresh_tokens.lock().unwrap().contains(t));
            if !known {
                return invalid_grant("Invalid refresh token");
            }
            let mut body = json!({
                "access_token": s.issue_access_token(),
                "token_type": "Bearer",
                "expires_in": 3600
            });
            if s.rotate_refresh_token.load(SeqCst) {
                body["refresh_token"] = json!(s.issue_refresh_token());
            }
            Json(body).into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        )
            .into_response(),
    }
}

async fn me(State(s): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    s.me_calls.fetch_add(1, SeqCst);
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn scripted(State(s): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    s.scripted_tokens
        .lock()
        .unwrap()
        .push(bearer(&headers).unwrap_or_default());
    let next = s.scripted.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => {
            (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
        }
        None => Json(json!({"ok": true})).into_response(),
    }
}

async fn list_playlists(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(user): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    s.record_query(&format!("GET /users/{user}/playlists"), query);
    Json(json!({
        "items": [playlist_json("playlist1", "Test Playlist"), playlist_json("playlist2", "Second")],
        "limit": 20,
        "offset": 0,
        "total": 2
    }))
    .into_response()
}

async fn create_playlist(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(user): UrlPath<String>,
    Json(body): Json<Value>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let name = body["name"].as_str().unwrap_or_default().to_string();
    s.record_body(format!("POST /users/{user}/playlists"), body);
    (
        StatusCode::CREATED,
        Json(playlist_json("new-playlist", &name)),
    )
        .into_response()
}

async fn get_playlist(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    s.record_query(&format!("GET /playlists/{id}"), query);
    Json(playlist_json(&id, "Test Playlist")).into_response()
}

async fn update_playlist(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    body: Bytes,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    s.record_body(format!("PUT /playlists/{id}"), body);
    StatusCode::OK.into_response()
}

async fn add_tracks(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<Value>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    s.record_body(format!("POST /playlists/{id}/tracks"), body);
    (StatusCode::CREATED, Json(json!({"snapshot_id": "snap-add"}))).into_response()
}

async fn remove_tracks(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<Value>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    s.record_body(format!("DELETE /playlists/{id}/tracks"), body);
    Json(json!({"snapshot_id": "snap-remove"})).into_response()
}

async fn get_track(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Non existing id"}})),
        )
            .into_response();
    }
    Json(track_json(&id)).into_response()
}

async fn search(
    State(s): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let empty = query.get("q").is_some_and(|q| q == "nothing");
    s.record_query("GET /search", query);
    if empty {
        return Json(json!({"tracks": {"items": [], "total": 0}})).into_response();
    }
    Json(json!({"tracks": {"items": [track_json("track1"), track_json("track2")], "total": 2}}))
        .into_response()
}
