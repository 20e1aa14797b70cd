//! Composite score aggregation.

use crate::core::UnitOutput;
use crate::orchestrator::config::OrchestratorConfig;

/// Computes the weighted mean of the succeeded units' scores, clamped to 0-100.
///
/// Units without a finite score and units whose weight is not positive are
/// ignored. Returns `None` when nothing remains to aggregate.
pub fn composite_score<'a, I>(succeeded: I, config: &OrchestratorConfig) -> Option<f64>
where
    I: IntoIterator<Item = (&'a str, &'a UnitOutput)>,
{
    let (weighted, total) = succeeded
        .into_iter()
        .filter_map(|(unit, output)| {
            let score = output.score.filter(|s| s.is_finite())?;
            let weight = config.weight_of(unit);
            (weight.is_finite() && weight > 0.0).then_some((score * weight, weight))
        })
        .fold((0.0, 0.0), |(sum, weights), (value, weight)| {
            (sum + value, weights + weight)
        });

    (total > 0.0).then(|| (weighted / total).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unweighted_mean() {
        let a = UnitOutput::scored(60.0);
        let b = UnitOutput::scored(80.0);
        let score = composite_score([("seo", &a), ("social", &b)], &OrchestratorConfig::default());
        assert_eq!(score, Some(70.0));
    }

    #[test]
    fn test_weighted_mean() {
        let a = UnitOutput::scored(60.0);
        let b = UnitOutput::scored(90.0);
        let config = OrchestratorConfig::default().with_score_weight("social", 2.0);
        let score = composite_score([("seo", &a), ("social", &b)], &config);
        assert_eq!(score, Some(80.0));
    }

    #[test]
    fn test_unscored_units_are_ignored() {
        let a = UnitOutput::new(serde_json::json!({"title": "Acme"}));
        let b = UnitOutput::scored(150.0);
        let config = OrchestratorConfig::default();

        assert_eq!(composite_score([("scrape", &a)], &config), None);
        assert_eq!(
            composite_score([("scrape", &a), ("seo", &b)], &config),
            Some(100.0)
        );
        assert_eq!(composite_score(Vec::new(), &config), None);
    }

    #[test]
    fn test_zero_weight_excludes_unit() {
        let a = UnitOutput::scored(10.0);
        let b = UnitOutput::scored(50.0);
        let config = OrchestratorConfig::default().with_score_weight("ai", 0.0);
        assert_eq!(composite_score([("ai", &a), ("seo", &b)], &config), Some(50.0));
    }
}
