use crate::camera::FrameSource;
use crate::config::CaptureConfig;
use crate::core::features::{extract_features, FrameFeatures};
use crate::core::template::{ScanStats, Template, TEMPLATE_FORMAT, TEMPLATE_VERSION};
use crate::core::{mean, round_places, std_dev};
use crate::error::{EyeScanError, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Capture session lifecycle. A failed or cancelled session always lands
/// back in `Idle` with no partial template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Sampling { completed: u32, total: u32 },
    Merged,
}

/// Cooperative cancellation handle, checked between samples.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a completed capture session.
#[derive(Debug, Clone)]
pub struct CapturedScan {
    /// The `eye-scan-v1` wire payload for transport or enrollment
    pub scan_data: String,
    /// Merged quality after the stability penalty
    pub quality: u8,
    pub template: Template,
}

/// Wire layout of a live scan, template fields plus capture metadata.
#[derive(Serialize)]
struct WireScan<'a> {
    format: &'a str,
    version: u32,
    hash: &'a str,
    #[serde(rename = "diffHash")]
    diff_hash: &'a str,
    hist: &'a [f64],
    quality: u8,
    stats: &'a ScanStats,
    samples: u32,
    #[serde(rename = "capturedAt")]
    captured_at: String,
}

/// Drives repeated frame extraction over one capture session and merges
/// the samples into a single template.
///
/// The session owns its frame source exclusively; sampling is strictly
/// sequential with a fixed inter-sample delay. Dropping the session (or
/// cancelling its token) releases the source without producing a template.
pub struct CaptureSession<S: FrameSource> {
    source: S,
    config: CaptureConfig,
    state: CaptureState,
    cancel: CancelToken,
}

impl<S: FrameSource> CaptureSession<S> {
    pub fn new(source: S, config: CaptureConfig) -> Self {
        Self {
            source,
            config,
            state: CaptureState::Idle,
            cancel: CancelToken::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Handle for cancelling this session from another owner (UI teardown,
    /// camera revocation).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn capture(&mut self) -> Result<CapturedScan> {
        let result = self.run();
        if result.is_err() {
            self.state = CaptureState::Idle;
        }
        result
    }

    fn run(&mut self) -> Result<CapturedScan> {
        let total = self.config.samples;
        let mut samples = Vec::with_capacity(total as usize);
        self.state = CaptureState::Sampling {
            completed: 0,
            total,
        };

        for index in 0..total {
            if self.cancel.is_cancelled() {
                return Err(EyeScanError::Cancelled);
            }

            let frame = self.source.next_frame()?;
            samples.push(extract_features(&frame, &self.config)?);
            self.state = CaptureState::Sampling {
                completed: index + 1,
                total,
            };
            debug!(sample = index + 1, total, "captured frame sample");

            if index + 1 < total {
                std::thread::sleep(Duration::from_millis(self.config.sample_delay_ms));
            }
        }

        let template = merge_samples(&samples, &self.config);
        let quality = template.quality;
        if quality < self.config.min_accepted_quality {
            warn!(
                quality,
                floor = self.config.min_accepted_quality,
                "scan quality is low; improve light and retry"
            );
        }

        let wire = WireScan {
            format: TEMPLATE_FORMAT,
            version: TEMPLATE_VERSION,
            hash: &template.hash,
            diff_hash: &template.diff_hash,
            hist: &template.hist,
            quality,
            stats: &template.stats,
            samples: total,
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let scan_data = serde_json::to_string(&wire)
            .map_err(|e| EyeScanError::InvalidScan(format!("Failed to serialize scan: {}", e)))?;

        self.state = CaptureState::Merged;
        Ok(CapturedScan {
            scan_data,
            quality,
            template,
        })
    }
}

/// Statistically merge one session's samples into a template, penalizing
/// unstable captures.
pub fn merge_samples(samples: &[FrameFeatures], config: &CaptureConfig) -> Template {
    let qualities: Vec<f64> = samples.iter().map(|s| s.quality as f64).collect();
    let stability_penalty = (std_dev(&qualities) * 0.8).min(15.0);
    let quality = (mean(&qualities) - stability_penalty).clamp(0.0, 100.0).round() as u8;

    let hashes: Vec<&str> = samples.iter().map(|s| s.hash.as_str()).collect();
    let diff_hashes: Vec<&str> = samples.iter().map(|s| s.diff_hash.as_str()).collect();
    let hists: Vec<&[f64]> = samples.iter().map(|s| s.hist.as_slice()).collect();

    Template {
        format: TEMPLATE_FORMAT.to_string(),
        version: TEMPLATE_VERSION,
        hash: merge_bit_hashes(&hashes),
        diff_hash: merge_bit_hashes(&diff_hashes),
        hist: merge_histograms(&hists, config.hist_bins as usize),
        quality,
        stats: merge_stats(samples),
    }
}

/// Per-bit majority vote; ties resolve to 1.
fn merge_bit_hashes(hashes: &[&str]) -> String {
    let Some(first) = hashes.first() else {
        return String::new();
    };

    (0..first.len())
        .map(|bit| {
            let ones = hashes
                .iter()
                .filter(|hash| hash.as_bytes().get(bit) == Some(&b'1'))
                .count();
            if ones * 2 >= hashes.len() {
                '1'
            } else {
                '0'
            }
        })
        .collect()
}

fn merge_histograms(histograms: &[&[f64]], bins: usize) -> Vec<f64> {
    if histograms.is_empty() {
        return Vec::new();
    }

    let mut merged = vec![0.0; bins];
    for histogram in histograms {
        for (bin, value) in merged.iter_mut().zip(histogram.iter()) {
            *bin += value;
        }
    }
    for bin in merged.iter_mut() {
        *bin /= histograms.len() as f64;
    }

    let total: f64 = merged.iter().sum();
    let total = if total > 0.0 { total } else { 1.0 };
    merged
        .iter()
        .map(|value| round_places(value / total, 6))
        .collect()
}

fn merge_stats(samples: &[FrameFeatures]) -> ScanStats {
    let brightness: Vec<f64> = samples.iter().map(|s| s.stats.brightness).collect();
    let contrast: Vec<f64> = samples.iter().map(|s| s.stats.contrast).collect();
    let sharpness: Vec<f64> = samples.iter().map(|s| s.stats.sharpness).collect();

    ScanStats {
        brightness: round_places(mean(&brightness), 2),
        contrast: round_places(mean(&contrast), 2),
        sharpness: round_places(mean(&sharpness), 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SyntheticSource;
    use crate::core::template::{decode_scan, ScanPayload};

    fn fast_config() -> CaptureConfig {
        CaptureConfig {
            samples: 3,
            sample_delay_ms: 0,
            ..CaptureConfig::default()
        }
    }

    fn features(hash: &str, diff_hash: &str, quality: u8) -> FrameFeatures {
        FrameFeatures {
            hash: hash.to_string(),
            diff_hash: diff_hash.to_string(),
            hist: vec![0.25, 0.25, 0.25, 0.25],
            stats: ScanStats {
                brightness: 120.0,
                contrast: 40.0,
                sharpness: 10.0,
            },
            quality,
        }
    }

    #[test]
    fn majority_vote_resolves_ties_to_one() {
        let samples = [features("10", "01", 80), features("01", "10", 80)];
        let merged = merge_samples(&samples, &CaptureConfig::default());

        assert_eq!(merged.hash, "11");
        assert_eq!(merged.diff_hash, "11");
    }

    #[test]
    fn majority_vote_follows_the_crowd() {
        let samples = [
            features("1100", "0011", 80),
            features("1100", "0011", 80),
            features("1111", "0000", 80),
        ];
        let merged = merge_samples(&samples, &CaptureConfig::default());

        assert_eq!(merged.hash, "1100");
        assert_eq!(merged.diff_hash, "0011");
    }

    #[test]
    fn outlier_sample_engages_the_stability_penalty() {
        let mut samples: Vec<FrameFeatures> =
            (0..6).map(|_| features("1010", "0101", 90)).collect();
        samples.push(features("1010", "0101", 20));

        let merged = merge_samples(&samples, &CaptureConfig::default());

        // Mean quality is 80; the std-dev penalty caps at 15
        assert_eq!(merged.quality, 65);
        assert!((merged.quality as f64) < 80.0);
    }

    #[test]
    fn steady_samples_take_no_penalty() {
        let samples: Vec<FrameFeatures> =
            (0..7).map(|_| features("1010", "0101", 90)).collect();
        let merged = merge_samples(&samples, &CaptureConfig::default());
        assert_eq!(merged.quality, 90);
    }

    #[test]
    fn merged_histogram_stays_normalized() {
        let samples = [features("10", "01", 80), features("01", "10", 70)];
        let merged = merge_samples(&samples, &CaptureConfig::default());

        let total: f64 = merged.hist.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn capture_produces_a_decodable_structured_payload() {
        let source = SyntheticSource::new(11, 320, 240).with_noise(4.0);
        let mut session = CaptureSession::new(source, fast_config());

        assert_eq!(session.state(), CaptureState::Idle);
        let scan = session.capture().unwrap();
        assert_eq!(session.state(), CaptureState::Merged);

        match decode_scan(&scan.scan_data) {
            ScanPayload::Structured(template) => {
                assert_eq!(template.hash, scan.template.hash);
                assert_eq!(template.quality, scan.quality);
            }
            ScanPayload::Legacy(_) => panic!("capture emitted an unstructured payload"),
        }
    }

    #[test]
    fn cancelled_session_yields_no_template() {
        let source = SyntheticSource::new(11, 320, 240);
        let mut session = CaptureSession::new(source, fast_config());

        session.cancel_token().cancel();
        let err = session.capture().unwrap_err();

        assert!(matches!(err, EyeScanError::Cancelled));
        assert_eq!(session.state(), CaptureState::Idle);
    }
}
