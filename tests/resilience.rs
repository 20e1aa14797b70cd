//! Resilient client behavior through the public API.

use brandscope::analyzers::HttpAnalyzer;
use brandscope::client::CacheRule;
use brandscope::prelude::*;
use brandscope::transport::{MockTransport, TransportError};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn registry(transport: Arc<MockTransport>, breaker: CircuitBreakerConfig) -> ResilienceRegistry {
    ResilienceRegistry::builder()
        .with_arc_transport(transport)
        .with_breaker_config(breaker)
        .with_retry_policy(
            RetryPolicy::default()
                .with_base_delay(Duration::from_millis(5))
                .with_max_delay(Duration::from_millis(20))
                .with_jitter(false),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn breaker_recovers_after_cooldown() {
    let transport = Arc::new(
        MockTransport::new()
            .push_error(TransportError::connect("refused"))
            .push_error(TransportError::connect("refused"))
            .with_fallback_response(HttpResponse::json_body(&json!({"ok": true}))),
    );
    let registry = ResilienceRegistry::builder()
        .with_arc_transport(transport.clone())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_breaker_config(
            CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_recovery_timeout(Duration::from_millis(50))
                .with_half_open_max_calls(1),
        )
        .build()
        .unwrap();
    let client = registry.client("twitter");
    let cancel = CancellationToken::new();
    let request = || OutboundRequest::new(HttpRequest::get("https://twitter.test/acme"));

    for _ in 0..2 {
        assert!(client.execute(request(), &cancel).await.is_err());
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    // Rejected without touching the transport
    let err = client.execute(request(), &cancel).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(transport.call_count(), 2);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(client.breaker().state(), CircuitState::HalfOpen);

    let response = client.execute(request(), &cancel).await.unwrap();
    assert!(response.is_success());
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(client.breaker().failure_count(), 0);

    let metrics = client.breaker().metrics();
    assert_eq!(metrics.times_opened, 1);
    assert_eq!(metrics.times_closed, 1);
    assert_eq!(metrics.rejected_requests, 1);
}

#[tokio::test]
async fn dependencies_have_isolated_breakers() {
    let transport = Arc::new(MockTransport::new());
    let registry = registry(transport.clone(), CircuitBreakerConfig::default());

    registry.breakers().get_or_create("openai").force_open();
    let cancel = CancellationToken::new();

    let openai = registry
        .client("openai")
        .execute(HttpRequest::get("https://openai.test/v1").into(), &cancel)
        .await;
    let moz = registry
        .client("moz")
        .execute(HttpRequest::get("https://moz.test/v2").into(), &cancel)
        .await;

    assert!(openai.unwrap_err().is_circuit_open());
    assert!(moz.is_ok());
    assert_eq!(transport.requested_urls(), vec!["https://moz.test/v2"]);

    let health = registry.health();
    let states: Vec<(&str, CircuitState)> = health
        .iter()
        .map(|snapshot| (snapshot.name.as_str(), snapshot.state))
        .collect();
    assert_eq!(
        states,
        vec![("moz", CircuitState::Closed), ("openai", CircuitState::Open)]
    );
}

#[tokio::test]
async fn rate_limit_honors_retry_after() {
    let transport = Arc::new(
        MockTransport::new()
            .push_response(HttpResponse::new(429).with_header("Retry-After", "1"))
            .with_fallback_response(HttpResponse::json_body(&json!({"followers": 1200}))),
    );
    let registry = registry(transport.clone(), CircuitBreakerConfig::default());
    let client = registry.client("twitter");

    let started = Instant::now();
    let body: serde_json::Value = client
        .get_json("https://twitter.test/acme", &[], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(body["followers"], 1200);
    assert_eq!(transport.call_count(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn repeated_analysis_is_served_from_cache() {
    let transport = Arc::new(
        MockTransport::new()
            .with_fallback_response(HttpResponse::json_body(&json!({"domain_authority": 55.0}))),
    );
    let registry = registry(transport.clone(), CircuitBreakerConfig::default());

    let orchestrator = AnalysisOrchestrator::builder()
        .add_analyzer(
            HttpAnalyzer::new("seo", registry.client("moz"), "https://moz.test/{host}")
                .with_scorer(|body| body["domain_authority"].as_f64()),
        )
        .build()
        .unwrap();

    let first = orchestrator.run(Subject::new("acme.com").unwrap()).await.unwrap();
    let second = orchestrator.run(Subject::new("acme.com").unwrap()).await.unwrap();
    let other = orchestrator.run(Subject::new("globex.com").unwrap()).await.unwrap();

    assert_eq!(first.composite_score, Some(55.0));
    assert_eq!(second.composite_score, Some(55.0));
    assert_eq!(other.composite_score, Some(55.0));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn cache_parameters_distinguish_entries() {
    let transport = Arc::new(MockTransport::new());
    let registry = registry(transport.clone(), CircuitBreakerConfig::default());
    let client = registry.client("pagespeed");
    let cancel = CancellationToken::new();

    for strategy in ["mobile", "desktop", "mobile"] {
        let outbound = OutboundRequest::cached(
            HttpRequest::get("https://speed.test/run?url=acme.com"),
            CacheRule::new("pagespeed").with_param("strategy", strategy),
        );
        client.execute(outbound, &cancel).await.unwrap();
    }

    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn exhausted_retries_report_attempts() {
    let transport = Arc::new(MockTransport::new().with_fallback_response(HttpResponse::new(502)));
    let registry = registry(
        transport.clone(),
        CircuitBreakerConfig::default().with_failure_threshold(100),
    );

    let err = registry
        .client("moz")
        .execute(
            HttpRequest::get("https://moz.test/v2").into(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResilienceError::ExhaustedRetries { attempts: 4, .. }
    ));
    assert_eq!(err.status(), Some(502));
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn unit_timeout_in_half_open_lets_breaker_recover() {
    let transport = Arc::new(
        MockTransport::new()
            .with_fallback_response(HttpResponse::json_body(&json!({"domain_authority": 48.0})))
            .with_latency(Duration::from_millis(200)),
    );
    let registry = ResilienceRegistry::builder()
        .with_arc_transport(transport.clone())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_breaker_config(
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_recovery_timeout(Duration::from_millis(20))
                .with_half_open_max_calls(1),
        )
        .build()
        .unwrap();
    let moz = registry.breakers().get_or_create("moz");
    moz.force_open();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let orchestrator = AnalysisOrchestrator::builder()
        .add_analyzer(
            HttpAnalyzer::new("seo", registry.client("moz"), "https://moz.test/{host}")
                .with_timeout(Duration::from_millis(30)),
        )
        .build()
        .unwrap();

    let job = orchestrator.run(Subject::new("acme.com").unwrap()).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.partial_results["seo"].error().unwrap().kind,
        brandscope::core::UnitFailureKind::Timeout
    );
    assert_eq!(transport.call_count(), 1);

    // The abandoned probe handed its slot back
    assert_eq!(moz.state(), CircuitState::HalfOpen);
    assert!(moz.is_available());
    let response = registry
        .client("moz")
        .execute(
            HttpRequest::get("https://moz.test/acme.com").into(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(moz.state(), CircuitState::Closed);
}
