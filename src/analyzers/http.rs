//! Generic JSON-endpoint analyzer.

use crate::client::ResilientClient;
use crate::core::{Analyzer, Subject, UnitError, UnitFailureKind, UnitOutput};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Scorer = Arc<dyn Fn(&serde_json::Value) -> Option<f64> + Send + Sync>;

/// An analyzer unit that fetches one JSON document and scores it.
///
/// The URL template may contain `{subject}`, `{url}` and `{host}`
/// placeholders. The response is requested as a cacheable GET, so repeated
/// analyses of the same subject within the cache TTL reuse it.
///
/// # Examples
///
/// ```rust,no_run
/// use brandscope::analyzers::HttpAnalyzer;
/// use brandscope::client::ResilienceRegistry;
/// use brandscope::transport::MockTransport;
///
/// let registry = ResilienceRegistry::builder()
///     .with_transport(MockTransport::new())
///     .build()
///     .unwrap();
///
/// let seo = HttpAnalyzer::new(
///     "seo",
///     registry.client("moz"),
///     "https://api.moz.test/v2/url_metrics?target={host}",
/// )
/// .with_scorer(|body| body["domain_authority"].as_f64());
/// ```
pub struct HttpAnalyzer {
    name: String,
    client: Arc<ResilientClient>,
    url_template: String,
    params: Vec<(String, String)>,
    scorer: Scorer,
    timeout: Option<Duration>,
}

impl HttpAnalyzer {
    /// Creates an analyzer whose output carries the raw document and no score.
    pub fn new(
        name: impl Into<String>,
        client: Arc<ResilientClient>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            url_template: url_template.into(),
            params: Vec::new(),
            scorer: Arc::new(|_| None),
            timeout: None,
        }
    }

    /// Sets the function that derives a 0-100 score from the document.
    pub fn with_scorer<F>(mut self, scorer: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Option<f64> + Send + Sync + 'static,
    {
        self.scorer = Arc::new(scorer);
        self
    }

    /// Adds a parameter that distinguishes cache entries.
    pub fn with_cache_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Sets a unit-specific timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Expands the URL template for a subject.
    pub fn url_for(&self, subject: &Subject) -> String {
        self.url_template
            .replace("{subject}", subject.as_str())
            .replace("{url}", &subject.url())
            .replace("{host}", subject.host())
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        subject: &Subject,
        cancel: &CancellationToken,
    ) -> Result<UnitOutput, UnitError> {
        let url = self.url_for(subject);
        let params: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let document: serde_json::Value = self
            .client
            .get_json(&url, &params, cancel)
            .await
            .map_err(|e| UnitError::from_resilience(&self.name, &e))?;

        let score = match (self.scorer)(&document) {
            Some(score) if score.is_finite() => Some(score),
            Some(score) => {
                return Err(UnitError::with_kind(
                    &self.name,
                    UnitFailureKind::Analysis,
                    format!("scorer produced a non-finite score: {score}"),
                ))
            }
            None => None,
        };

        Ok(UnitOutput { score, data: document })
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for HttpAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAnalyzer")
            .field("name", &self.name)
            .field("dependency", &self.client.dependency())
            .field("url_template", &self.url_template)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResilienceRegistry;
    use crate::core::UnitFailureKind;
    use crate::retry::RetryPolicy;
    use crate::transport::{HttpResponse, MockTransport};

    fn registry(transport: MockTransport) -> ResilienceRegistry {
        ResilienceRegistry::builder()
            .with_transport(transport)
            .with_retry_policy(RetryPolicy::no_retry())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_scores_document() {
        let transport = MockTransport::new().with_fallback_response(HttpResponse::json_body(
            &serde_json::json!({"domain_authority": 64.0}),
        ));
        let registry = registry(transport);
        let analyzer = HttpAnalyzer::new(
            "seo",
            registry.client("moz"),
            "https://api.moz.test/metrics?target={host}",
        )
        .with_scorer(|body| body["domain_authority"].as_f64());

        let output = analyzer
            .analyze(&Subject::new("https://acme.com/about").unwrap(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.score, Some(64.0));
        assert_eq!(output.data["domain_authority"], 64.0);
    }

    #[tokio::test]
    async fn test_dependency_failure_becomes_unit_error() {
        let transport = MockTransport::new().with_fallback_response(HttpResponse::new(500));
        let registry = registry(transport);
        let analyzer = HttpAnalyzer::new("pagespeed", registry.client("pagespeed"), "{url}");

        let err = analyzer
            .analyze(&Subject::new("acme.com").unwrap(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.unit, "pagespeed");
        assert_eq!(err.kind, UnitFailureKind::Dependency);
    }

    #[test]
    fn test_url_template() {
        let registry = registry(MockTransport::new());
        let analyzer = HttpAnalyzer::new(
            "ai",
            registry.client("openai"),
            "https://api.test/assess?site={url}&brand={subject}",
        );
        let url = analyzer.url_for(&Subject::new("acme.com").unwrap());
        assert_eq!(url, "https://api.test/assess?site=https://acme.com&brand=acme.com");
    }
}
