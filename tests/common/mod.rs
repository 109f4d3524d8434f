//! Shared utilities for integration testing.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::response::IntoResponse;
use axum::{Json, Router};
use tokio::net::{TcpListener, TcpStream};

use captcha_gateway::config::GatewayConfig;
use captcha_gateway::http::HttpServer;
use captcha_gateway::lifecycle::Shutdown;
use captcha_gateway::security::rate_limit;

/// Start a mock upstream that echoes the method, path, query, and headers
/// of every request it receives, and counts hits.
pub async fn start_echo_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
    async fn echo(State(hits): State<Arc<AtomicUsize>>, req: Request) -> impl IntoResponse {
        hits.fetch_add(1, Ordering::SeqCst);
        let headers: BTreeMap<String, String> = req
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Json(serde_json::json!({
            "method": req.method().as_str(),
            "path": req.uri().path(),
            "query": req.uri().query(),
            "headers": headers,
        }))
    }

    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(echo).with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, hits)
}

/// Spawn a gateway on an ephemeral port and wait until it accepts.
#[allow(dead_code)]
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let limiter = rate_limit::select_backend(&config, &shutdown).await;
    let server = HttpServer::new(Arc::new(config), limiter).expect("gateway init");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.run(listener, shutdown.clone()));

    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return (addr, shutdown);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway at {addr} did not become ready");
}

/// A listening address that is guaranteed to refuse connections.
#[allow(dead_code)]
pub async fn dead_upstream_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
