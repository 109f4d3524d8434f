use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use captcha_gateway::config;
use captcha_gateway::http::HttpServer;
use captcha_gateway::lifecycle::{signals, Shutdown};
use captcha_gateway::observability::{logging, metrics};
use captcha_gateway::security::rate_limit;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    tracing::info!("captcha-gateway v0.1.0 starting");

    let config = match config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        rate_limit_requests = config.rate_limit.requests,
        rate_limit_window_secs = config.rate_limit.window.as_secs(),
        shared_counter_store = config.redis.is_some(),
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr);
    }

    let config = Arc::new(config);
    let shutdown = Shutdown::new();

    let limiter = rate_limit::select_backend(&config, &shutdown).await;

    let server = match HttpServer::new(config.clone(), limiter) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "Failed to initialize upstream clients");
            std::process::exit(1);
        }
    };

    server.probe_upstreams().await;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, address = %addr, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!(
        address = %addr,
        environment = %config.environment,
        "API gateway started"
    );

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        });
    }

    server.run(listener, shutdown).await?;

    tracing::info!("API gateway stopped");
    Ok(())
}
