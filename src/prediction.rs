//! Turning ranked search results into tagged predictions with a confidence tier.

use serde::{Deserialize, Serialize};

use crate::config::PredictionConfig;
use crate::model::ScoredSummary;

/// How much a prediction can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Good,
    Medium,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Good => write!(f, "GOOD"),
            Self::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// A suggested set of semantic tags for a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub property_type: Option<String>,
    pub property_value: String,
    pub semantic_tags: Vec<String>,
    /// Id of the summary the prediction came from; `None` for merged results.
    pub derived_from: Option<String>,
    pub score: f64,
    pub confidence: Confidence,
}

/// Keep the strongest distinct results.
///
/// Results with identical tag sets collapse to the higher-scoring one. The
/// survivors must beat `top * cutoff_percentage` and be non-negative.
pub fn filter_summaries(results: Vec<ScoredSummary>, cutoff_percentage: f64) -> Vec<ScoredSummary> {
    let mut distinct: Vec<ScoredSummary> = Vec::with_capacity(results.len());
    for result in results {
        match distinct
            .iter_mut()
            .find(|d| d.summary.semantic_tags == result.summary.semantic_tags)
        {
            Some(existing) if result.score > existing.score => *existing = result,
            Some(_) => {}
            None => distinct.push(result),
        }
    }

    let Some(top) = distinct.iter().map(|r| r.score).reduce(f64::max) else {
        return distinct;
    };
    let floor = top * cutoff_percentage;
    let mut kept: Vec<ScoredSummary> = distinct
        .into_iter()
        .filter(|r| r.score >= 0.0 && (r.score > floor || r.score == top))
        .collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));
    kept
}

/// HIGH when exactly one result clears `cutoff_score`; GOOD when several do,
/// or when the only result does not; MEDIUM otherwise.
pub fn confidence(results: &[ScoredSummary], cutoff_score: f64) -> Confidence {
    let above = results.iter().filter(|r| r.score > cutoff_score).count();
    match (above, results.len()) {
        (1, _) => Confidence::High,
        (n, _) if n > 1 => Confidence::Good,
        (_, 1) => Confidence::Good,
        _ => Confidence::Medium,
    }
}

/// Filter the results and label every survivor with one shared confidence.
pub fn predict(results: Vec<ScoredSummary>, config: &PredictionConfig) -> Vec<Prediction> {
    let kept = filter_summaries(results, config.cutoff_percentage);
    let tier = confidence(&kept, config.cutoff_score);
    kept.into_iter()
        .map(|r| Prediction {
            property_type: r.summary.property_type,
            property_value: r.summary.property_value,
            semantic_tags: r.summary.semantic_tags,
            derived_from: r.summary.id,
            score: r.score,
            confidence: tier,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationSummary;

    fn scored(tags: &[&str], score: f64) -> ScoredSummary {
        ScoredSummary {
            summary: AnnotationSummary {
                id: Some(format!("{tags:?}")),
                property_type: Some("disease".into()),
                property_value: "asthma".into(),
                semantic_tags: tags.iter().map(|t| t.to_string()).collect(),
                annotation_uris: vec!["urn:a".into()],
                sources: Vec::new(),
                quality: 10.0,
            },
            score,
        }
    }

    #[test]
    fn duplicate_tag_sets_keep_the_higher_score() {
        let kept = filter_summaries(vec![scored(&["a"], 85.0), scored(&["a"], 95.0), scored(&["b"], 90.0)], 0.8);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 95.0);
        assert_eq!(kept[1].summary.semantic_tags, vec!["b"]);
    }

    #[test]
    fn weak_results_are_cut() {
        let kept = filter_summaries(vec![scored(&["a"], 100.0), scored(&["b"], 80.0), scored(&["c"], 81.0)], 0.8);
        let scores: Vec<f64> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![100.0, 81.0]);
        assert!(filter_summaries(Vec::new(), 0.8).is_empty());
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(confidence(&[scored(&["a"], 90.0), scored(&["b"], 60.0)], 80.0), Confidence::High);
        assert_eq!(confidence(&[scored(&["a"], 90.0), scored(&["b"], 85.0)], 80.0), Confidence::Good);
        assert_eq!(confidence(&[scored(&["a"], 60.0)], 80.0), Confidence::Good);
        assert_eq!(confidence(&[scored(&["a"], 60.0), scored(&["b"], 55.0)], 80.0), Confidence::Medium);
        assert_eq!(confidence(&[], 80.0), Confidence::Medium);
    }

    #[test]
    fn predictions_share_one_tier() {
        let predictions = predict(
            vec![scored(&["a"], 99.0), scored(&["b"], 90.0)],
            &PredictionConfig::default(),
        );
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|p| p.confidence == Confidence::Good));
        assert_eq!(predictions[0].derived_from.as_deref(), Some("[\"a\"]"));
    }
}
