use crate::error::{EyeScanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Square working resolution frames are resampled to before analysis
    #[serde(default = "default_frame_size")]
    pub frame_size: u32,
    /// Average-hash grid is hash_grid x hash_grid; difference hash uses one extra column
    #[serde(default = "default_hash_grid")]
    pub hash_grid: u32,
    #[serde(default = "default_hist_bins")]
    pub hist_bins: u32,
    /// Frames sampled per capture session
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default = "default_sample_delay")]
    pub sample_delay_ms: u64,
    /// Merged quality below this gets a "retake" hint; capture still succeeds
    #[serde(default = "default_min_accepted_quality")]
    pub min_accepted_quality: u8,
}

fn default_frame_size() -> u32 { 240 }
fn default_hash_grid() -> u32 { 16 }
fn default_hist_bins() -> u32 { 16 }
fn default_samples() -> u32 { 7 }
fn default_sample_delay() -> u64 { 180 }
fn default_min_accepted_quality() -> u8 { 55 }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            hash_grid: default_hash_grid(),
            hist_bins: default_hist_bins(),
            samples: default_samples(),
            sample_delay_ms: default_sample_delay(),
            min_accepted_quality: default_min_accepted_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatcherConfig {
    /// Minimum confidence for a structured-template match
    #[serde(default = "default_structured_threshold")]
    pub structured_threshold: u8,
    /// Minimum similarity for the legacy digest comparator
    #[serde(default = "default_legacy_threshold")]
    pub legacy_threshold: u8,
    /// Scans below this quality are rejected regardless of confidence
    #[serde(default = "default_min_quality")]
    pub min_quality: u8,
    #[serde(default = "default_hash_weight")]
    pub hash_weight: f64,
    #[serde(default = "default_diff_hash_weight")]
    pub diff_hash_weight: f64,
    #[serde(default = "default_histogram_weight")]
    pub histogram_weight: f64,
    #[serde(default = "default_stats_weight")]
    pub stats_weight: f64,
}

fn default_structured_threshold() -> u8 { 78 }
fn default_legacy_threshold() -> u8 { 85 }
fn default_min_quality() -> u8 { 50 }
fn default_hash_weight() -> f64 { 0.45 }
fn default_diff_hash_weight() -> f64 { 0.35 }
fn default_histogram_weight() -> f64 { 0.15 }
fn default_stats_weight() -> f64 { 0.05 }

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            structured_threshold: default_structured_threshold(),
            legacy_threshold: default_legacy_threshold(),
            min_quality: default_min_quality(),
            hash_weight: default_hash_weight(),
            diff_hash_weight: default_diff_hash_weight(),
            histogram_weight: default_histogram_weight(),
            stats_weight: default_stats_weight(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Overrides the platform data directory when set
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| EyeScanError::Other(anyhow::anyhow!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a file when given one, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.frame_size < 16 || self.capture.frame_size > 1024 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Frame size must be between 16 and 1024, got {}",
                self.capture.frame_size
            )));
        }
        if self.capture.hash_grid < 2 || self.capture.hash_grid > 64 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Hash grid must be between 2 and 64, got {}",
                self.capture.hash_grid
            )));
        }
        if self.capture.hist_bins < 4 || self.capture.hist_bins > 256 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Histogram bins must be between 4 and 256, got {}",
                self.capture.hist_bins
            )));
        }
        if self.capture.samples == 0 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Capture must take at least one sample"
            )));
        }

        if self.matcher.structured_threshold > 100 || self.matcher.legacy_threshold > 100 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Match thresholds must be between 0 and 100"
            )));
        }
        if self.matcher.min_quality > 100 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Minimum quality must be between 0 and 100, got {}",
                self.matcher.min_quality
            )));
        }

        let weight_sum = self.matcher.hash_weight
            + self.matcher.diff_hash_weight
            + self.matcher.histogram_weight
            + self.matcher.stats_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(EyeScanError::Other(anyhow::anyhow!(
                "Score weights must sum to 1.0, got {}",
                weight_sum
            )));
        }

        Ok(())
    }
}
