//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use http_mirror::config::MirrorConfig;
use http_mirror::http::HttpServer;
use http_mirror::lifecycle::Shutdown;

/// Start a mirror server on `addr`. Trigger the returned handle to stop it.
pub async fn start_mirror(addr: SocketAddr, strict_headers: bool) -> Shutdown {
    let mut config = MirrorConfig::default();
    config.listener.bind_address = addr.to_string();
    config.security.strict_headers = strict_headers;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown
}

/// A client that never reuses connections or goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
