use std::time::Duration;

use spotiplay::Error;
use spotiplay::config::RedirectTarget;
use spotiplay::server::{CallbackPoll, CallbackServer};

mod common;

const WAIT: Duration = Duration::from_secs(5);

// Helper function to start a receiver on a fresh loopback port
async fn start_server() -> (CallbackServer, String) {
    let port = common::free_port();
    let mut server = CallbackServer::new(RedirectTarget {
        host: "127.0.0.1".into(),
        port,
        path: "/callback".into(),
    });
    server.start().await.unwrap();
    (server, format!("http://127.0.0.1:{port}/callback"))
}

async fn get(url: String) -> (u16, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_code_with_matching_state() {
    let (mut server, base) = start_server().await;

    let (status, page) = get(format!("{base}?code=XYZ&state=S")).await;
    assert_eq!(status, 200);
    assert!(page.contains("Authorization successful"));

    let code = server.wait_for_result("S", WAIT).await.unwrap();
    assert_eq!(code, "XYZ");

    server.stop().await;
}

#[tokio::test]
async fn test_code_is_consumed_once() {
    let (mut server, base) = start_server().await;
    get(format!("{base}?code=XYZ&state=S")).await;

    assert_eq!(server.wait_for_result("S", WAIT).await.unwrap(), "XYZ");
    assert_eq!(server.poll("S").await, CallbackPoll::Pending);

    server.stop().await;
}

#[tokio::test]
async fn test_error_callback() {
    let (mut server, base) = start_server().await;

    let (status, page) = get(format!("{base}?error=access_denied&state=S")).await;
    assert_eq!(status, 200);
    assert!(page.contains("not granted"));

    let err = server.wait_for_result("S", WAIT).await.unwrap_err();
    match err {
        Error::Authorization(message) => assert!(message.contains("access_denied")),
        other => panic!("unexpected error: {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_callback_without_code() {
    let (mut server, base) = start_server().await;

    let (status, page) = get(format!("{base}?state=S")).await;
    assert_eq!(status, 200);
    assert!(page.contains("Invalid callback"));
    assert_eq!(server.poll("S").await, CallbackPoll::Pending);

    server.stop().await;
}

#[tokio::test]
async fn test_mismatched_state_is_ignored() {
    let (mut server, base) = start_server().await;

    get(format!("{base}?code=FORGED&state=OTHER")).await;
    assert_eq!(server.poll("S").await, CallbackPoll::Mismatched);

    get(format!("{base}?code=XYZ&state=S")).await;
    assert_eq!(server.wait_for_result("S", WAIT).await.unwrap(), "XYZ");

    server.stop().await;
}

#[tokio::test]
async fn test_missing_state_is_rejected() {
    let (mut server, base) = start_server().await;

    get(format!("{base}?code=XYZ")).await;
    assert_eq!(server.poll("S").await, CallbackPoll::Mismatched);

    server.stop().await;
}

#[tokio::test]
async fn test_first_result_wins() {
    let (mut server, base) = start_server().await;

    get(format!("{base}?code=FIRST&state=S")).await;
    get(format!("{base}?code=SECOND&state=S")).await;
    assert_eq!(server.wait_for_result("S", WAIT).await.unwrap(), "FIRST");

    server.stop().await;
}

#[tokio::test]
async fn test_timeout_releases_port() {
    let (mut server, _) = start_server().await;
    let addr = server.local_addr().unwrap();

    let err = server
        .wait_for_result("S", Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthorizationTimeout(_)));

    server.stop().await;
    assert!(!server.is_running());

    // the same port can be bound again right away
    let mut again = CallbackServer::new(RedirectTarget {
        host: "127.0.0.1".into(),
        port: addr.port(),
        path: "/callback".into(),
    });
    again.start().await.unwrap();
    assert_eq!(again.local_addr(), Some(addr));
    again.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut idle = CallbackServer::new(RedirectTarget {
        host: "127.0.0.1".into(),
        port: common::free_port(),
        path: "/callback".into(),
    });
    idle.stop().await;
    assert!(!idle.is_running());

    let (mut server, _) = start_server().await;
    assert!(server.is_running());
    server.stop().await;
    server.stop().await;
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_port_in_use() {
    let (mut server, _) = start_server().await;
    let addr = server.local_addr().unwrap();

    let mut clash = CallbackServer::new(RedirectTarget {
        host: "127.0.0.1".into(),
        port: addr.port(),
        path: "/callback".into(),
    });
    assert!(matches!(clash.start().await, Err(Error::Io(_))));

    server.stop().await;
}
