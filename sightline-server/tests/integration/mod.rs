
use crate::utils::{TestServer, WsClient, spawn_server, test_config};
use std::time::Duration;
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn create_test_server() -> TestServer {
    spawn_server(test_config(1))
        .await
        .expect("Failed to start test server")
}

pub async fn connect_client(server: &TestServer, name: &str) -> WsClient {
    WsClient::connect(&server.ws_url(Some(name)))
        .await
        .expect("Failed to connect websocket client")
}

/// Polls `check` every 20ms, panicking after `timeout_ms`.
pub async fn wait_until(timeout_ms: u64, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout_ms}ms"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
