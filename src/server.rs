use std::{net::SocketAddr, time::Duration};

use axum::{Extension, Router, routing::get};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};
use tracing::{debug, warn};

use crate::{
    api::{self, CallbackSlot},
    config::RedirectTarget,
    error::{Error, Result},
    types::CallbackResult,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What a single look at the callback slot found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPoll {
    /// Nothing usable has arrived yet.
    Pending,
    /// A code whose state matched the expected one.
    Code(String),
    /// The authorization server reported an error.
    Denied(String),
    /// A code arrived with a foreign or missing state and was discarded.
    Mismatched,
}

/// Short-lived HTTP listener receiving the authorization redirect.
///
/// Owns the bound port for the duration of one authorization attempt. The
/// port is released by [`CallbackServer::stop`] and, as a fallback, when the
/// server is dropped.
pub struct CallbackServer {
    target: RedirectTarget,
    slot: CallbackSlot,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackServer {
    pub fn new(target: RedirectTarget) -> Self {
        Self {
            target,
            slot: CallbackSlot::default(),
            local_addr: None,
            shutdown: None,
            task: None,
        }
    }

    /// Binds the listener and starts serving the redirect path.
    ///
    /// Returns once the port is bound; calling it on a running server is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the redirect address cannot be bound, e.g.
    /// because another process holds the port. Nothing is left running in
    /// that case.
    pub async fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Ok(());
        }

        let app = Router::new().route(
            &self.target.path,
            get(api::callback).layer(Extension(self.slot.clone())),
        );

        let listener = tokio::net::TcpListener::bind(self.target.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "callback server terminated with an error");
            }
        });

        debug!(addr = %local_addr, path = %self.target.path, "callback server listening");
        self.local_addr = Some(local_addr);
        self.shutdown = Some(tx);
        self.task = Some(task);
        Ok(())
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Looks at the slot once without blocking.
    ///
    /// Codes carrying a state other than `expected_state` are removed from the
    /// slot so a later, genuine callback can still be recorded.
    pub async fn poll(&self, expected_state: &str) -> CallbackPoll {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            None => CallbackPoll::Pending,
            Some(CallbackResult::Error { error, .. }) => CallbackPoll::Denied(error),
            Some(CallbackResult::Code { code, state }) => {
                if state.as_deref() == Some(expected_state) {
                    CallbackPoll::Code(code)
                } else {
                    CallbackPoll::Mismatched
                }
            }
        }
    }

    /// Waits for the authorization redirect and returns its code.
    ///
    /// # Arguments
    ///
    /// * `expected_state` - The `state` sent with the authorization URL;
    ///   callbacks carrying any other value are discarded
    /// * `limit` - How long to wait before giving up
    ///
    /// # Errors
    ///
    /// - [`Error::Authorization`] when the redirect carries an `error`
    ///   parameter (e.g. the user denied access)
    /// - [`Error::AuthorizationTimeout`] when no matching code arrives within
    ///   `limit`
    pub async fn wait_for_result(&self, expected_state: &str, limit: Duration) -> Result<String> {
        let deadline = Instant::now() + limit;

        loop {
            match self.poll(expected_state).await {
                CallbackPoll::Code(code) => return Ok(code),
                CallbackPoll::Denied(error) => {
                    return Err(Error::Authorization(format!(
                        "authorization server returned error: {error}"
                    )));
                }
                CallbackPoll::Mismatched => {
                    warn!("ignoring authorization callback with mismatched state");
                }
                CallbackPoll::Pending => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::AuthorizationTimeout(limit));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Tears the listener down. Safe to call repeatedly or before `start`.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        let Some(mut task) = self.task.take() else {
            return;
        };

        match timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => debug!("callback server stopped"),
            Ok(Err(e)) if e.is_cancelled() => debug!("callback server task cancelled"),
            Ok(Err(e)) => warn!(error = %e, "callback server task failed"),
            Err(_) => {
                warn!("callback server did not drain in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
        self.local_addr = None;
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
