//! Rate-limit sequencing against a live gateway.

use std::sync::atomic::Ordering;

use captcha_gateway::config::GatewayConfig;

mod common;

#[tokio::test]
async fn window_allowance_is_enforced_in_order() {
    let (upstream, hits) = common::start_echo_upstream().await;
    let mut config = GatewayConfig::default();
    config.services.auth_url = format!("http://{upstream}");
    config.services.captcha_url = format!("http://{upstream}");
    config.rate_limit.requests = 3;
    let (gateway, _shutdown) = common::spawn_gateway(config).await;

    let client = reqwest::Client::new();
    let url = format!("http://{gateway}/api/v1/auth/login");

    for expected_remaining in ["2", "1", "0"] {
        let res = client.post(&url).body("{}").send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "3");
        assert_eq!(
            res.headers().get("x-ratelimit-remaining").unwrap(),
            expected_remaining
        );
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    for _ in 0..2 {
        let res = client.post(&url).body("{}").send().await.unwrap();
        assert_eq!(res.status(), 429);
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert!(res.headers().contains_key("x-request-id"));

        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "rate_limit_exceeded");
    }

    // Rejected requests never reached the upstream.
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn health_endpoint_is_never_rate_limited() {
    let (upstream, _hits) = common::start_echo_upstream().await;
    let mut config = GatewayConfig::default();
    config.services.auth_url = format!("http://{upstream}");
    config.services.captcha_url = format!("http://{upstream}");
    config.rate_limit.requests = 1;
    let (gateway, _shutdown) = common::spawn_gateway(config).await;

    for _ in 0..5 {
        let res = reqwest::get(format!("http://{gateway}/health")).await.unwrap();
        assert_eq!(res.status(), 200);
        assert!(res.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn unmatched_routes_do_not_consume_quota() {
    let (upstream, _hits) = common::start_echo_upstream().await;
    let mut config = GatewayConfig::default();
    config.services.auth_url = format!("http://{upstream}");
    config.services.captcha_url = format!("http://{upstream}");
    config.rate_limit.requests = 1;
    let (gateway, _shutdown) = common::spawn_gateway(config).await;

    let client = reqwest::Client::new();

    for _ in 0..3 {
        let res = client
            .get(format!("http://{gateway}/api/v1/bogus"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);
    }

    // The single allowed request is still available.
    let res = client
        .post(format!("http://{gateway}/api/v1/auth/login"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}
