//! Resilient analysis example.
//!
//! This example shows how to:
//! - Share breakers, cache and transport through a `ResilienceRegistry`
//! - Build analyzer units on top of resilient clients
//! - Run a job where one dependency is down and the report degrades
//! - Inspect dependency health afterwards
//!
//! Run with: cargo run --example resilient_analysis

use brandscope::analyzers::{HttpAnalyzer, MockAnalyzer};
use brandscope::prelude::*;
use brandscope::transport::{MockTransport, TransportError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brandscope=debug".into()),
        )
        .init();

    println!("=== Resilient Analysis Example ===\n");

    // The SEO provider answers; the social provider refuses every connection.
    let transport = Arc::new(
        MockTransport::new()
            .with_fallback_response(HttpResponse::json_body(&serde_json::json!({
                "domain_authority": 64.0
            }))),
    );
    let social_transport = Arc::new(MockTransport::failing(TransportError::connect(
        "connection refused",
    )));

    let registry = ResilienceRegistry::builder()
        .with_arc_transport(transport.clone())
        .with_retry_policy(
            RetryPolicy::default()
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(50)),
        )
        .with_breaker_config(CircuitBreakerConfig::default().with_failure_threshold(3))
        .build()?;
    let social_registry = ResilienceRegistry::builder()
        .with_arc_transport(social_transport.clone())
        .with_retry_policy(RetryPolicy::aggressive().with_base_delay(Duration::from_millis(20)))
        .build()?;

    let orchestrator = AnalysisOrchestrator::builder()
        .add_analyzer(
            HttpAnalyzer::new(
                "seo",
                registry.client("moz"),
                "https://api.moz.test/v2/url_metrics?target={host}",
            )
            .with_scorer(|body| body["domain_authority"].as_f64()),
        )
        .add_analyzer(
            HttpAnalyzer::new(
                "social",
                social_registry.client("twitter"),
                "https://api.twitter.test/lookup?q={host}",
            )
            .with_timeout(Duration::from_secs(5)),
        )
        .add_analyzer(MockAnalyzer::succeeding("ai", 72.0).with_latency(Duration::from_millis(30)))
        .with_config(OrchestratorConfig::default().with_score_weight("ai", 0.5))
        .build()?;

    let job = orchestrator.run(Subject::new("acme.com")?).await?;

    println!("\nJob {} finished as {}", job.id, job.status);
    println!("  Composite score: {:?}", job.composite_score);
    for (unit, result) in &job.partial_results {
        match result.error() {
            None => println!("  {unit}: ok"),
            Some(error) => println!("  {unit}: failed ({})", error.reason),
        }
    }
    if let Some(message) = &job.error_message {
        println!("  Summary: {message}");
    }

    // A second run of the same subject is served from cache for the SEO unit.
    let before = transport.call_count();
    orchestrator.run(Subject::new("acme.com")?).await?;
    println!(
        "\nSEO transport calls on the second run: {}",
        transport.call_count() - before
    );

    println!("\nDependency health:");
    for snapshot in registry.health().iter().chain(social_registry.health().iter()) {
        println!(
            "  {}: {} ({} failures, {} rejected)",
            snapshot.name,
            snapshot.state,
            snapshot.failure_count,
            snapshot.metrics.rejected_requests
        );
    }
    println!("  Social transport calls: {}", social_transport.call_count());

    Ok(())
}
