//! Annotation quality and summary scoring.
//!
//! Annotation quality is fixed at index-build time. Summary scores combine
//! that quality with verification count, retrieval rank, usage frequency and
//! source preference, and can be rescaled into a fixed window using
//! calibration bounds computed once per build.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Annotation, AnnotationSummary, Evidence, SourceRanking};

/// Corpus sizes used to normalize frequency and rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub summary_count: usize,
    pub annotation_count: usize,
}

/// Expected raw score bounds for one index build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub min: f64,
    pub max: f64,
}

/// Target window for calibrated scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWindow {
    pub center: f64,
    pub half_width: f64,
}

impl Default for ScoreWindow {
    fn default() -> Self {
        Self {
            center: 50.0,
            half_width: 50.0,
        }
    }
}

/// `log10` of a millisecond timestamp, 0 for timestamps at or before the epoch.
fn recency(timestamp_ms: i64) -> f64 {
    if timestamp_ms <= 0 {
        0.0
    } else {
        (timestamp_ms as f64).log10()
    }
}

/// Intrinsic quality of one annotation.
///
/// Trusted evidence dominates; newer annotations score slightly higher; a
/// source ranked in `ranking` adds `sqrt(position) - 1`.
pub fn annotation_quality(annotation: &Annotation, ranking: &SourceRanking) -> f64 {
    let provenance = &annotation.provenance;
    let evidence = provenance.evidence.trust_score();
    let timestamp = recency(provenance.generated.timestamp_millis());
    let position = ranking.position_score(&provenance.source.uri) as f64;
    evidence + timestamp + (position.sqrt() - 1.0)
}

/// Converts index records and their retrieval rank into scores.
#[derive(Debug, Clone)]
pub struct SummaryScorer {
    ranking: SourceRanking,
    window: Option<ScoreWindow>,
    worst_rank: usize,
}

impl SummaryScorer {
    pub fn new(ranking: SourceRanking, window: Option<ScoreWindow>, worst_rank: usize) -> Self {
        Self {
            ranking,
            window,
            worst_rank,
        }
    }

    /// `1 + frequency / annotations`; neutral for an empty corpus.
    pub fn frequency_normalization(&self, frequency: usize, stats: CorpusStats) -> f64 {
        if stats.annotation_count == 0 {
            1.0
        } else {
            1.0 + frequency as f64 / stats.annotation_count as f64
        }
    }

    /// `1 - rank / summaries`; neutral for an empty index.
    pub fn rank_normalization(&self, rank: usize, stats: CorpusStats) -> f64 {
        if stats.summary_count == 0 {
            1.0
        } else {
            1.0 - rank as f64 / stats.summary_count as f64
        }
    }

    /// `sqrt` of the best ranking position among the summary's sources, 1 if none is ranked.
    pub fn source_rank_boost(&self, summary: &AnnotationSummary) -> f64 {
        let best = self
            .ranking
            .best_position_score(summary.sources.iter().map(|s| s.uri.as_str()));
        (best as f64).sqrt()
    }

    /// Uncalibrated score for a record retrieved at `rank` (1-based).
    pub fn raw_score(&self, summary: &AnnotationSummary, rank: usize, stats: CorpusStats) -> f64 {
        let base = summary.quality + summary.times_verified() as f64;
        base * self.rank_normalization(rank, stats)
            * self.frequency_normalization(summary.frequency(), stats)
            + self.source_rank_boost(summary)
    }

    /// Score, calibrated into the configured window when one is set.
    pub fn score(
        &self,
        summary: &AnnotationSummary,
        rank: usize,
        stats: CorpusStats,
        calibration: Calibration,
    ) -> f64 {
        let raw = self.raw_score(summary, rank, stats);
        match self.window {
            Some(window) => rescale(raw, calibration, window),
            None => raw,
        }
    }

    /// Bounds for a corpus: the weakest plausible hit and the best actual record.
    ///
    /// The minimum models a single least-trusted annotation from 2000-01-01,
    /// verified once, retrieved at the worst expected rank. The maximum is the
    /// best record retrieved first.
    pub fn calibrate(&self, records: &[AnnotationSummary], stats: CorpusStats) -> Calibration {
        let y2k_ms = Utc
            .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .single()
            .map(|t| t.timestamp_millis())
            .unwrap_or(946_684_800_000);
        let bottom_quality = Evidence::Unknown.trust_score() + recency(y2k_ms);
        let worst_rank = self.worst_rank.min(stats.summary_count);
        let min = (bottom_quality + 1.0)
            * self.rank_normalization(worst_rank, stats)
            * self.frequency_normalization(1, stats)
            + 1.0;
        let max = records
            .iter()
            .map(|r| self.raw_score(r, 1, stats))
            .fold(min, f64::max);
        Calibration { min, max }
    }
}

impl Default for SummaryScorer {
    fn default() -> Self {
        Self::new(SourceRanking::default(), Some(ScoreWindow::default()), 200)
    }
}

/// Map `raw` linearly from `[min, max]` onto `[center, center + half_width]`.
///
/// Scores under the minimum sit at the center. A degenerate interval sends
/// everything at or above the minimum to the top of the window.
pub fn rescale(raw: f64, calibration: Calibration, window: ScoreWindow) -> f64 {
    if raw < calibration.min {
        return window.center;
    }
    let span = calibration.max - calibration.min;
    if span <= f64::EPSILON {
        return window.center + window.half_width;
    }
    window.center + window.half_width * (raw - calibration.min) / span
}
