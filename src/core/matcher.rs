use crate::config::MatcherConfig;
use crate::core::template::{decode_scan, normalized_hash, ScanPayload, ScanStats, Template};

/// Result of matching a live scan against one stored template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub verified: bool,
    pub confidence: u8,
}

impl VerifyOutcome {
    fn rejected() -> Self {
        Self {
            verified: false,
            confidence: 0,
        }
    }
}

/// Score a live scan payload against a stored template.
///
/// Both sides are decoded once; two structured templates take the weighted
/// multi-metric path, anything else falls back to the legacy digest
/// comparator with its stricter threshold.
pub fn verify(live_payload: &str, stored_template: &str, config: &MatcherConfig) -> VerifyOutcome {
    if live_payload.is_empty() || stored_template.is_empty() {
        return VerifyOutcome::rejected();
    }

    let live = decode_scan(live_payload);
    let stored = decode_scan(stored_template);

    match (&live, &stored) {
        (ScanPayload::Structured(live), ScanPayload::Structured(stored)) => {
            let confidence = structured_confidence(live, stored, config).round() as u8;
            VerifyOutcome {
                verified: confidence >= config.structured_threshold
                    && live.quality >= config.min_quality,
                confidence,
            }
        }
        _ => {
            let live_digest = normalized_hash(live_payload);
            let confidence = digest_similarity(&live_digest, stored_template);
            VerifyOutcome {
                verified: confidence >= config.legacy_threshold,
                confidence,
            }
        }
    }
}

/// Weighted confidence between two structured templates, before final
/// integer rounding. Clamped to [0, 100].
pub fn structured_confidence(live: &Template, stored: &Template, config: &MatcherConfig) -> f64 {
    let hash_score = bit_similarity(&live.hash, &stored.hash);
    let diff_hash_score = bit_similarity(&live.diff_hash, &stored.diff_hash);
    let histogram_score = histogram_intersection(&live.hist, &stored.hist);
    let stats_score = stats_similarity(&live.stats, &stored.stats);

    let base = hash_score * config.hash_weight
        + diff_hash_score * config.diff_hash_weight
        + histogram_score * config.histogram_weight
        + stats_score * config.stats_weight;

    // A low-quality capture on either side suppresses confidence even when
    // the bit patterns align
    let quality_floor = live.quality.min(stored.quality) as f64;
    let min_quality = config.min_quality as f64;
    let quality_penalty = if quality_floor < min_quality {
        (min_quality - quality_floor) * 0.8
    } else {
        0.0
    };

    (base - quality_penalty).clamp(0.0, 100.0)
}

/// Percentage of positionally matching bits, scaled over the longer
/// length so length mismatches are penalized rather than ignored.
pub fn bit_similarity(left: &str, right: &str) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let max_length = left.len().max(right.len());
    let matches = left
        .bytes()
        .zip(right.bytes())
        .filter(|(a, b)| a == b)
        .count();

    matches as f64 / max_length as f64 * 100.0
}

/// Histogram intersection: symmetric and bounded since both histograms
/// sum to 1.
pub fn histogram_intersection(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let overlap: f64 = left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| a.min(*b))
        .sum();

    (overlap.clamp(0.0, 1.0) * 100.0).round()
}

/// Inverse-distance scores over the three capture statistics; the least
/// identity-specific signal, so it only carries tiebreaker weight.
fn stats_similarity(live: &ScanStats, stored: &ScanStats) -> f64 {
    let brightness_score =
        100.0 - ((live.brightness - stored.brightness).abs() * 1.1).clamp(0.0, 100.0);
    let contrast_score = 100.0 - ((live.contrast - stored.contrast).abs() * 2.1).clamp(0.0, 100.0);
    let sharpness_score =
        100.0 - ((live.sharpness - stored.sharpness).abs() * 2.4).clamp(0.0, 100.0);

    (brightness_score * 0.35 + contrast_score * 0.35 + sharpness_score * 0.3).round()
}

/// Position-wise character match between a live digest and a stored legacy
/// string, over the longer length.
pub fn digest_similarity(left: &str, right: &str) -> u8 {
    if left.is_empty() || right.is_empty() {
        return 0;
    }
    if left == right {
        return 100;
    }

    let max_length = left.len().max(right.len());
    let matches = left
        .bytes()
        .zip(right.bytes())
        .filter(|(a, b)| a == b)
        .count();

    (matches as f64 / max_length as f64 * 100.0).round() as u8
}
