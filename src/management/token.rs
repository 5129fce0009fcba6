use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::types::TokenPair;

/// On-disk shape of the token cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedTokens {
    access_token: String,
    refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<i64>,
}

/// A cached pair together with whether its access token has outlived the
/// configured lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub pair: TokenPair,
    pub expired: bool,
}

/// Best-effort persistence of the current token pair.
///
/// Every operation swallows its failures: a broken cache only ever costs a
/// fresh interactive authorization, never a failed request.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: Option<PathBuf>,
    ttl: Option<Duration>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ttl: None,
        }
    }

    /// A store that never reads or writes anything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            ttl: None,
        }
    }

    /// Entries saved longer than `ttl` ago are reported as expired.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// `<data_local_dir>/spotiplay/cache/token.json`
    pub fn default_path() -> PathBuf {
        let mut path = crate::config::app_dir();
        path.push("cache/token.json");
        path
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub async fn load(&self) -> Option<TokenPair> {
        self.load_entry().await.map(|entry| entry.pair)
    }

    pub async fn load_entry(&self) -> Option<CachedEntry> {
        let path = self.path.as_ref()?;

        let content = match async_fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cached tokens");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cached tokens");
                return None;
            }
        };

        let cached: CachedTokens = match serde_json::from_str(&content) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse cached tokens");
                return None;
            }
        };

        if cached.access_token.is_empty() {
            warn!(path = %path.display(), "cached tokens have an empty access token");
            return None;
        }

        let expired = match (self.ttl, cached.saved_at) {
            (Some(ttl), Some(saved_at)) => {
                let age = Utc::now().timestamp().saturating_sub(saved_at);
                age < 0 || age as u64 > ttl.as_secs()
            }
            _ => false,
        };

        debug!(path = %path.display(), expired, "loaded tokens from cache");
        Some(CachedEntry {
            pair: TokenPair::new(
                cached.access_token,
                Some(cached.refresh_token).filter(|t| !t.is_empty()),
            ),
            expired,
        })
    }

    /// Persists the pair if it carries both tokens.
    ///
    /// The JSON is written to a sibling temp file that no other writer can
    /// share and renamed over the target, so readers never observe a
    /// half-written cache.
    pub async fn save(&self, pair: &TokenPair) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        let Some(refresh_token) = pair.refresh_token.as_ref() else {
            debug!("not caching token pair without refresh token");
            return;
        };
        if pair.access_token.is_empty() || refresh_token.is_empty() {
            return;
        }

        let cached = CachedTokens {
            access_token: pair.access_token.clone(),
            refresh_token: refresh_token.clone(),
            saved_at: Some(Utc::now().timestamp()),
        };

        if let Err(e) = Self::write_atomic(path, &cached).await {
            warn!(path = %path.display(), error = %e, "failed to save tokens to cache");
        } else {
            debug!(path = %path.display(), "saved tokens to cache");
        }
    }

    pub async fn clear(&self) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        match async_fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "cleared cached tokens"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to clear cached tokens"),
        }
    }

    async fn write_atomic(path: &PathBuf, cached: &CachedTokens) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(cached)?;
        let tmp = temp_path(path);

        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)
                .await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = async_fs::rename(&tmp, path).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Sibling temp file unique to this write: `<path>.<pid>.<nanos>.<random>.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(
        ".{}.{}.{:016x}.tmp",
        std::process::id(),
        Utc::now().timestamp_subsec_nanos(),
        rand::random::<u64>()
    ));
    PathBuf::from(tmp)
}
