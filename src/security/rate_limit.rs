//! Per-client rate limiting with two interchangeable backends.
//!
//! # Data Flow
//! ```text
//! request → client key (peer IP, or X-Forwarded-For behind a trusted proxy)
//!         → RateLimiter::allow(key)
//!             shared backend: INCR + EXPIRE NX + TTL in one pipeline
//!             local backend:  Mutex<HashMap> fixed window
//!         → Decision {allowed, limit, remaining, reset}
//!         → 429 or pass, rate-limit headers either way
//! ```
//!
//! # Design Decisions
//! - Backend selection happens once at startup; the request path never
//!   branches between backends
//! - The shared backend fails open: a dead counter store must not become a
//!   global outage. The warn log is throttled to one line per 30 s
//! - The local map is swept in the background so idle clients do not
//!   accumulate

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;

use crate::config::{GatewayConfig, RedisConfig};
use crate::error::GatewayError;
use crate::http::request::client_ip;
use crate::http::server::AppState;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// How long the counter store may take to answer the startup ping.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum spacing between fail-open warnings.
const FAIL_OPEN_WARN_INTERVAL: Duration = Duration::from_secs(30);

/// How often the local backend evicts stale windows.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of a single allowance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets; only the shared backend knows this.
    pub reset_secs: Option<u64>,
    /// Whether the backend actually recorded the request. False means the
    /// store was unreachable and the request passed uncounted.
    pub counted: bool,
}

impl Decision {
    fn fail_open(limit: u32) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_secs: None,
            counted: false,
        }
    }
}

/// Narrow allowance contract shared by both backends.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, key: &str) -> Decision;
}

/// Pick the backend once at startup: the shared store when configured and
/// reachable, the in-process map otherwise.
pub async fn select_backend(config: &GatewayConfig, shutdown: &Shutdown) -> Arc<dyn RateLimiter> {
    let limit = config.rate_limit.requests;
    let window = config.rate_limit.window;

    if let Some(redis_cfg) = &config.redis {
        match RedisRateLimiter::connect(redis_cfg, limit, window).await {
            Ok(limiter) => {
                tracing::info!(
                    host = %redis_cfg.host,
                    port = redis_cfg.port,
                    "Rate limiting with shared counter store"
                );
                return Arc::new(limiter);
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Failed to connect to Redis, using in-memory rate limiting"
                );
            }
        }
    }

    let limiter = Arc::new(LocalRateLimiter::new(limit, window));
    LocalRateLimiter::spawn_sweeper(limiter.clone(), shutdown);
    limiter
}

/// Middleware applying the allowance check to every matched route.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_ip(&state.config.trusted_proxies, addr, req.headers()).to_string();
    let decision = state.limiter.allow(&key).await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited("window_limit");
        GatewayError::RateLimitExceeded.into_response()
    };

    if decision.counted {
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        if let Some(reset) = decision.reset_secs {
            headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
        }
    }

    response
}

/// Shared backend on the external counter store.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    limit: u32,
    window: Duration,
    last_warn: Mutex<Option<Instant>>,
}

impl RedisRateLimiter {
    pub async fn connect(
        cfg: &RedisConfig,
        limit: u32,
        window: Duration,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(cfg.url())?;

        let mut conn = tokio::time::timeout(CONNECT_TIMEOUT, client.get_connection_manager())
            .await
            .map_err(|_| timeout_error("connection timed out"))??;

        let pong: String = tokio::time::timeout(
            CONNECT_TIMEOUT,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| timeout_error("ping timed out"))??;
        debug_assert_eq!(pong, "PONG");

        Ok(Self {
            conn,
            limit,
            window,
            last_warn: Mutex::new(None),
        })
    }

    /// One warn line per interval, however many requests fail open.
    fn warn_throttled(&self, err: &redis::RedisError) {
        let mut last = match self.last_warn.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if last.map_or(true, |at| at.elapsed() >= FAIL_OPEN_WARN_INTERVAL) {
            *last = Some(Instant::now());
            tracing::warn!(
                error = %err,
                "Counter store unreachable, rate limiter failing open"
            );
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &str) -> Decision {
        let key = format!("rate_limit:{key}");
        let window_secs = self.window.as_secs();
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.incr(&key, 1i64);
        // The window starts at the first increment and is not extended by
        // later requests.
        pipe.cmd("EXPIRE")
            .arg(&key)
            .arg(window_secs)
            .arg("NX")
            .ignore();
        pipe.ttl(&key);

        let result: redis::RedisResult<(i64, i64)> = pipe.query_async(&mut conn).await;
        match result {
            Ok((count, ttl)) => {
                let remaining = u32::try_from(i64::from(self.limit) - count).unwrap_or(0);
                let reset = if ttl > 0 { ttl as u64 } else { window_secs };
                Decision {
                    allowed: count <= i64::from(self.limit),
                    limit: self.limit,
                    remaining,
                    reset_secs: Some(reset),
                    counted: true,
                }
            }
            Err(err) => {
                self.warn_throttled(&err);
                Decision::fail_open(self.limit)
            }
        }
    }
}

fn timeout_error(detail: &str) -> redis::RedisError {
    redis::RedisError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, detail.to_string()))
}

/// One client's window state.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    first_seen: Instant,
}

/// In-process backend used when no counter store is configured.
pub struct LocalRateLimiter {
    clients: Mutex<HashMap<String, WindowEntry>>,
    limit: u32,
    window: Duration,
}

impl LocalRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Drop windows whose start is older than twice the window length.
    /// Returns the number of evicted entries.
    pub fn prune(&self, now: Instant) -> usize {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        let before = clients.len();
        let horizon = self.window * 2;
        clients.retain(|_, entry| now.duration_since(entry.first_seen) <= horizon);
        before - clients.len()
    }

    pub fn spawn_sweeper(limiter: Arc<Self>, shutdown: &Shutdown) {
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let evicted = limiter.prune(Instant::now());
                        if evicted > 0 {
                            tracing::debug!(evicted, "Swept idle rate-limit windows");
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn allow(&self, key: &str) -> Decision {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(_) => return Decision::fail_open(self.limit),
        };
        let now = Instant::now();

        let entry = clients
            .entry(key.to_string())
            .and_modify(|entry| {
                if now.duration_since(entry.first_seen) > self.window {
                    entry.count = 1;
                    entry.first_seen = now;
                } else {
                    entry.count += 1;
                }
            })
            .or_insert(WindowEntry {
                count: 1,
                first_seen: now,
            });

        Decision {
            allowed: entry.count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(entry.count),
            reset_secs: None,
            counted: true,
        }
    }
}
