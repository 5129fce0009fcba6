use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, response::Html};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::CallbackResult;

const SUCCESS_PAGE: &str = "<h2>Authorization successful.</h2><p>You can close this browser window and return to your terminal.</p>";
const ERROR_PAGE: &str =
    "<h2>Authorization was not granted.</h2><p>Return to your terminal for details.</p>";
const INVALID_PAGE: &str = "<h4>Invalid callback: missing authorization code.</h4>";

/// Slot the callback handler records its single result into.
pub type CallbackSlot = Arc<Mutex<Option<CallbackResult>>>;

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(slot): Extension<CallbackSlot>,
) -> Html<&'static str> {
    let state = params.get("state").cloned();

    let (result, page) = if let Some(error) = params.get("error") {
        warn!(%error, "authorization callback reported an error");
        (
            CallbackResult::Error {
                error: error.clone(),
                state,
            },
            ERROR_PAGE,
        )
    } else if let Some(code) = params.get("code") {
        (
            CallbackResult::Code {
                code: code.clone(),
                state,
            },
            SUCCESS_PAGE,
        )
    } else {
        return Html(INVALID_PAGE);
    };

    let mut slot = slot.lock().await;
    if slot.is_none() {
        *slot = Some(result);
    } else {
        // first result wins until the waiter consumes it
        debug!("callback result already recorded, ignoring");
    }

    Html(page)
}
