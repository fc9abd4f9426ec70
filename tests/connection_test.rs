//! Connection lifecycle and registry resolution.

mod common;

use common::{BAD_PASSWORD, MEMORY_URL, connect, connect_with, memory_registry};
use db_driver::config::Credentials;
use db_driver::error::DriverError;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_get_connection_opens_session() {
    let (registry, state) = memory_registry();
    let conn = assert_ok!(
        registry
            .get_connection(MEMORY_URL, "test_js_sql", "123456")
            .await
    );
    assert!(!conn.is_closed());
    assert_eq!(conn.driver_name(), "Memory");
    assert_eq!(conn.database(), "test");
    assert_eq!(conn.server_version(), Some("memory-1.0"));
    assert_eq!(state.open_sessions(), 1);

    let info = conn.info();
    assert_eq!(info.port, 7000);
    assert_eq!(info.host, "localhost");
}

#[tokio::test]
async fn test_connection_failure_is_an_error() {
    let (registry, state) = memory_registry();
    let err = assert_err!(
        registry
            .get_connection(MEMORY_URL, "test_js_sql", BAD_PASSWORD)
            .await
    );
    assert!(matches!(err, DriverError::Connection { .. }));
    assert!(err.suggestion().is_some());
    assert_eq!(state.open_sessions(), 0);
}

#[tokio::test]
async fn test_url_credentials_are_fallback_only() {
    let (registry, _state) = memory_registry();
    let url = format!("memory://user:{}@localhost/test", BAD_PASSWORD);

    // Explicit credentials win over the URL.
    assert_ok!(registry.get_connection(&url, "user", "123456").await);
    // Without them the URL's credentials are used.
    let err = assert_err!(registry.connect(&url, Credentials::default()).await);
    assert!(matches!(err, DriverError::Connection { .. }));
}

#[tokio::test]
async fn test_unknown_scheme_and_bad_url() {
    let (registry, _state) = memory_registry();

    let err = assert_err!(
        registry
            .get_connection("oracle://localhost/test", "u", "p")
            .await
    );
    assert!(matches!(err, DriverError::NoSuitableDriver { .. }));
    assert!(!registry.accepts_url("oracle://localhost/test"));
    assert!(registry.accepts_url("MEMORY://localhost/test"));

    let err = assert_err!(registry.get_connection("memory://localhost", "u", "p").await);
    assert!(matches!(err, DriverError::InvalidUrl { .. }));

    let err = assert_err!(
        registry
            .get_connection("memory://localhost/test?query_timeout=soon", "u", "p")
            .await
    );
    assert!(matches!(err, DriverError::InvalidUrl { .. }));
}

#[tokio::test]
async fn test_close_is_idempotent_and_releases_session() {
    let (conn, state) = connect().await;
    let mut stmt = conn.create_statement().unwrap();
    let mut ps = conn.prepare_statement("SELECT * FROM people").unwrap();

    assert_ok!(conn.close().await);
    assert_ok!(conn.close().await);
    assert!(conn.is_closed());
    assert_eq!(state.open_sessions(), 0);
    assert_eq!(state.closed.load(std::sync::atomic::Ordering::SeqCst), 1);

    let err = assert_err!(stmt.execute("SELECT * FROM people").await);
    assert!(matches!(err, DriverError::ConnectionClosed));
    let err = assert_err!(ps.execute().await);
    assert!(matches!(err, DriverError::ConnectionClosed));
    assert!(stmt.is_closed());

    let err = assert_err!(conn.create_statement());
    assert!(matches!(err, DriverError::ConnectionClosed));
    let err = assert_err!(conn.prepare_statement("SELECT * FROM people"));
    assert!(matches!(err, DriverError::ConnectionClosed));
}

#[tokio::test]
async fn test_clones_share_the_session() {
    let (conn, state) = connect().await;
    let other = conn.clone();
    assert_eq!(conn, other);

    other.close().await.unwrap();
    assert!(conn.is_closed());
    assert_eq!(state.open_sessions(), 0);

    let (separate, _) = connect().await;
    assert_ne!(conn, separate);
}

#[tokio::test]
async fn test_busy_connection_fails_fast() {
    let (conn, state) = connect_with("?busy_timeout=0").await;
    let mut blocker = conn.create_statement().unwrap();
    let running = tokio::spawn(async move { blocker.execute("BLOCK").await });
    state.entered.notified().await;

    let mut stmt = conn.create_statement().unwrap();
    let err = assert_err!(stmt.execute("SELECT * FROM people").await);
    assert!(matches!(err, DriverError::ConnectionBusy));
    assert!(err.is_retryable());

    state.release.notify_one();
    assert!(!running.await.unwrap().unwrap());
    assert_ok!(stmt.execute("SELECT * FROM people").await);
}

#[tokio::test]
async fn test_busy_connection_waits_for_turn() {
    let (conn, state) = connect_with("?busy_timeout=5").await;
    let mut blocker = conn.create_statement().unwrap();
    let running = tokio::spawn(async move { blocker.execute("BLOCK").await });
    state.entered.notified().await;

    let waiter_state = Arc::clone(&state);
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waiter_state.release.notify_one();
    });

    let mut stmt = conn.create_statement().unwrap();
    assert_ok!(stmt.execute("SELECT * FROM people").await);
    release.await.unwrap();
    assert_ok!(running.await.unwrap());
}

#[tokio::test]
async fn test_query_timeout_closes_connection() {
    let (conn, _state) = connect_with("?query_timeout=1").await;
    let mut stmt = conn.create_statement().unwrap();

    let err = assert_err!(stmt.execute("BLOCK").await);
    assert!(matches!(err, DriverError::Timeout { .. }));
    assert!(conn.is_closed());

    let err = assert_err!(stmt.execute("SELECT * FROM people").await);
    assert!(matches!(err, DriverError::ConnectionClosed));
}

#[tokio::test]
async fn test_native_sql_is_identity_for_plain_driver() {
    let (conn, _state) = connect().await;
    assert_eq!(
        conn.native_sql("SELECT * FROM people WHERE name = ?"),
        "SELECT * FROM people WHERE name = ?"
    );
}
