//! Approximate matching of normalized patterns against known property values.
//!
//! Global alignment (Needleman-Wunsch) similarity is tried first with a strict
//! threshold; when it finds nothing, token-set Jaccard similarity is used as a
//! looser fallback. Candidates are then cut down to a top-K within a
//! percentage of the best score.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Gap penalty for global alignment; substitutions cost 1, matches 0.
const GAP_COST: f64 = 2.0;

const NEGATION_MARKERS: &[&str] = &[
    " not ", " no ", " non ", " not-", " no-", " non-", " dont ", " don't ", " didn't ", " n't ",
    " never ",
];

/// Thresholds for one similarity pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityFilter {
    /// Candidates scoring below this are never considered.
    pub min_score: f64,
    /// Keep at most this many candidates.
    pub max_results: usize,
    /// After the first kept candidate, discard any below `top * pct_cutoff`.
    pub pct_cutoff: f64,
}

/// A dictionary entry that resembles the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub value: String,
    pub similarity: f64,
}

/// Needleman-Wunsch similarity in `[0, 1]`.
///
/// The alignment distance is scaled by the worst possible cost for the longer
/// string. Two empty strings are identical.
pub fn needleman_wunsch(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut prev: Vec<f64> = (0..=b.len()).map(|j| j as f64 * GAP_COST).collect();
    let mut curr = vec![0.0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = (i + 1) as f64 * GAP_COST;
        for (j, cb) in b.iter().enumerate() {
            let substitution = if ca == cb { 0.0 } else { 1.0 };
            curr[j + 1] = (prev[j] + substitution)
                .min(prev[j + 1] + GAP_COST)
                .min(curr[j] + GAP_COST);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let distance = prev[b.len()];
    1.0 - distance / (longest as f64 * GAP_COST)
}

/// Jaccard similarity of whitespace token sets, 0 when both are empty.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Whether `text` contains a negation marker.
pub fn is_negative(text: &str) -> bool {
    let padded = format!(" {} ", text.to_lowercase());
    NEGATION_MARKERS.iter().any(|m| padded.contains(m))
}

/// Both texts affirmative, or both negative.
pub fn same_polarity(a: &str, b: &str) -> bool {
    is_negative(a) == is_negative(b)
}

/// Score every dictionary entry and keep the best per `filter`.
pub fn find_similar(
    pattern: &str,
    dictionary: &[String],
    metric: fn(&str, &str) -> f64,
    filter: SimilarityFilter,
) -> Vec<SimilarMatch> {
    let mut candidates: Vec<SimilarMatch> = dictionary
        .par_iter()
        .filter_map(|value| {
            let similarity = metric(pattern, value);
            (similarity >= filter.min_score).then(|| SimilarMatch {
                value: value.clone(),
                similarity,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.value.cmp(&b.value))
    });

    let mut kept: Vec<SimilarMatch> = Vec::new();
    let mut cutoff = 0.0;
    for candidate in candidates {
        if kept.len() >= filter.max_results {
            break;
        }
        if candidate.similarity < cutoff {
            continue;
        }
        if kept.is_empty() {
            cutoff = candidate.similarity * filter.pct_cutoff;
        }
        tracing::trace!(value = %candidate.value, similarity = candidate.similarity, "approximate candidate kept");
        kept.push(candidate);
    }
    kept
}

/// Two-pass approximate matcher.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateMatcher {
    pub alignment: SimilarityFilter,
    pub token_set: SimilarityFilter,
}

impl ApproximateMatcher {
    pub fn new(alignment: SimilarityFilter, token_set: SimilarityFilter) -> Self {
        Self {
            alignment,
            token_set,
        }
    }

    /// Alignment matches, or Jaccard matches when alignment finds nothing.
    pub fn find(&self, pattern: &str, dictionary: &[String]) -> Vec<SimilarMatch> {
        if dictionary.is_empty() || pattern.is_empty() {
            return Vec::new();
        }
        let aligned = find_similar(pattern, dictionary, needleman_wunsch, self.alignment);
        if !aligned.is_empty() {
            return aligned;
        }
        find_similar(pattern, dictionary, jaccard, self.token_set)
    }
}

impl Default for ApproximateMatcher {
    fn default() -> Self {
        Self {
            alignment: SimilarityFilter {
                min_score: 0.90,
                max_results: 1,
                pct_cutoff: 0.0,
            },
            token_set: SimilarityFilter {
                min_score: 0.525,
                max_results: 1,
                pct_cutoff: 0.999,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn alignment_similarity_bounds() {
        assert_eq!(needleman_wunsch("liver", "liver"), 1.0);
        assert_eq!(needleman_wunsch("", ""), 1.0);
        assert_eq!(needleman_wunsch("abc", ""), 0.0);
        // One gap in twelve characters: 1 - 2 / 24.
        let s = needleman_wunsch("homo sapien", "homo sapiens");
        assert!((s - (1.0 - 2.0 / 24.0)).abs() < 1e-9);
        // One substitution: 1 - 1 / 24.
        let s = needleman_wunsch("homo sapiens", "homo sapienz");
        assert!((s - (1.0 - 1.0 / 24.0)).abs() < 1e-9);
    }

    #[test]
    fn jaccard_on_token_sets() {
        assert_eq!(jaccard("breast cancer", "cancer breast"), 1.0);
        assert!((jaccard("breast cancer tissue", "breast cancer") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard("", ""), 0.0);
    }

    #[test]
    fn alignment_first_then_token_set() {
        let matcher = ApproximateMatcher::default();
        let dictionary = dict(&["homo sapiens", "mus musculus", "breast cancer"]);

        let hits = matcher.find("homo sapien", &dictionary);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "homo sapiens");

        // Word order defeats alignment but not token sets.
        let hits = matcher.find("cancer breast", &dictionary);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "breast cancer");
        assert_eq!(hits[0].similarity, 1.0);
    }

    #[test]
    fn empty_dictionary_or_no_candidate() {
        let matcher = ApproximateMatcher::default();
        assert!(matcher.find("anything", &[]).is_empty());
        assert!(matcher.find("zebrafish", &dict(&["homo sapiens"])).is_empty());
    }

    #[test]
    fn cutoff_fixed_after_first_kept() {
        let filter = SimilarityFilter {
            min_score: 0.0,
            max_results: 10,
            pct_cutoff: 0.9,
        };
        let dictionary = dict(&["a b c d", "a b c", "a b", "a"]);
        let hits = find_similar("a b c d", &dictionary, jaccard, filter);
        // Top is 1.0, so 0.75 and below are cut.
        assert_eq!(hits.len(), 1);

        let filter = SimilarityFilter {
            pct_cutoff: 0.5,
            max_results: 2,
            ..filter
        };
        let hits = find_similar("a b c d", &dictionary, jaccard, filter);
        assert_eq!(
            hits.iter().map(|h| h.value.as_str()).collect::<Vec<_>>(),
            vec!["a b c d", "a b c"]
        );
    }

    #[test]
    fn polarity() {
        assert!(is_negative("not infected"));
        assert!(is_negative("non-smoker"));
        assert!(is_negative("never smoked"));
        assert!(!is_negative("nonsense mutation"));
        assert!(!is_negative("smoker"));
        assert!(same_polarity("smoker", "heavy smoker"));
        assert!(!same_polarity("smoker", "non-smoker"));
    }
}
