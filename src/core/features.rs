use crate::camera::Frame;
use crate::config::CaptureConfig;
use crate::core::template::ScanStats;
use crate::core::{mean, round_places};
use crate::error::{EyeScanError, Result};

/// Fraction of the shorter source dimension kept by the centered crop.
const SOURCE_ROI_FRACTION: f64 = 0.68;
/// Fraction of the working resolution kept as the analysis window.
const ANALYSIS_ROI_FRACTION: f64 = 0.72;

/// Perceptual features of a single captured frame.
#[derive(Debug, Clone)]
pub struct FrameFeatures {
    pub hash: String,
    pub diff_hash: String,
    pub hist: Vec<f64>,
    pub stats: ScanStats,
    pub quality: u8,
}

/// Turn one raw frame into a comparable feature set.
///
/// The frame is center-cropped to discard border content, resampled to the
/// configured working resolution, and a centered analysis window is cut out
/// of that. All statistics and hashes are computed over the window's luma.
pub fn extract_features(frame: &Frame, config: &CaptureConfig) -> Result<FrameFeatures> {
    if frame.width == 0 || frame.height == 0 {
        return Err(EyeScanError::CameraNotReady);
    }

    let source_size = ((frame.width.min(frame.height) as f64 * SOURCE_ROI_FRACTION) as u32).max(1);
    let source_x = (frame.width - source_size) / 2;
    let source_y = (frame.height - source_size) / 2;

    let cropped = crop_luma(frame, source_x, source_y, source_size);
    let working = resize_nearest(
        &cropped,
        source_size,
        source_size,
        config.frame_size,
        config.frame_size,
    );

    let roi_size = ((config.frame_size as f64 * ANALYSIS_ROI_FRACTION) as u32).max(2);
    let roi_offset = (config.frame_size - roi_size) / 2;
    let gray = crop_region(&working, config.frame_size, roi_offset, roi_offset, roi_size);

    let brightness = mean(&gray);
    let contrast = contrast_of(&gray, brightness);
    let sharpness = sharpness_of(&gray, roi_size, roi_size);
    let quality = quality_score(brightness, contrast, sharpness);

    Ok(FrameFeatures {
        hash: average_hash(&gray, roi_size, roi_size, config.hash_grid),
        diff_hash: difference_hash(&gray, roi_size, roi_size, config.hash_grid),
        hist: histogram(&gray, config.hist_bins),
        stats: ScanStats {
            brightness: round_places(brightness, 2),
            contrast: round_places(contrast, 2),
            sharpness: round_places(sharpness, 2),
        },
        quality,
    })
}

/// Exposure/contrast/focus proxy combined into a 0-100 usability score.
/// Any single failing factor caps the total.
pub fn quality_score(brightness: f64, contrast: f64, sharpness: f64) -> u8 {
    let brightness_score = (100.0 - (brightness - 125.0).abs() * 1.2).clamp(0.0, 100.0);
    let contrast_score = (contrast / 50.0 * 100.0).clamp(0.0, 100.0);
    let sharpness_score = (sharpness / 20.0 * 100.0).clamp(0.0, 100.0);
    (brightness_score * 0.3 + contrast_score * 0.35 + sharpness_score * 0.35).round() as u8
}

fn crop_luma(frame: &Frame, x0: u32, y0: u32, size: u32) -> Vec<f64> {
    let mut gray = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let offset = (((y0 + y) * frame.width + x0 + x) * 4) as usize;
            let r = frame.pixels[offset] as f64;
            let g = frame.pixels[offset + 1] as f64;
            let b = frame.pixels[offset + 2] as f64;
            gray.push(r * 0.2126 + g * 0.7152 + b * 0.0722);
        }
    }
    gray
}

fn crop_region(gray: &[f64], stride: u32, x0: u32, y0: u32, size: u32) -> Vec<f64> {
    let mut region = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            region.push(gray[((y0 + y) * stride + x0 + x) as usize]);
        }
    }
    region
}

/// Nearest-neighbor resample: each target cell maps to its nearest source
/// pixel, no blending.
fn resize_nearest(
    gray: &[f64],
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> Vec<f64> {
    let mut resized = Vec::with_capacity((target_width * target_height) as usize);
    for y in 0..target_height {
        let source_y =
            (((y as f64 + 0.5) * height as f64 / target_height as f64) as u32).min(height - 1);
        for x in 0..target_width {
            let source_x =
                (((x as f64 + 0.5) * width as f64 / target_width as f64) as u32).min(width - 1);
            resized.push(gray[(source_y * width + source_x) as usize]);
        }
    }
    resized
}

fn contrast_of(gray: &[f64], brightness: f64) -> f64 {
    if gray.is_empty() {
        return 0.0;
    }
    let variance = gray.iter().map(|v| (v - brightness).powi(2)).sum::<f64>() / gray.len() as f64;
    variance.sqrt()
}

/// Mean absolute luma gradient over the 4-neighborhood, skipping the last
/// row and column.
fn sharpness_of(gray: &[f64], width: u32, height: u32) -> f64 {
    if gray.is_empty() || width < 2 || height < 2 {
        return 0.0;
    }

    let width = width as usize;
    let mut gradient_sum = 0.0;
    let mut samples = 0u64;

    for y in 0..height as usize - 1 {
        for x in 0..width - 1 {
            let index = y * width + x;
            gradient_sum += (gray[index] - gray[index + 1]).abs();
            gradient_sum += (gray[index] - gray[index + width]).abs();
            samples += 2;
        }
    }

    if samples == 0 {
        0.0
    } else {
        gradient_sum / samples as f64
    }
}

/// One bit per grid cell, set when the cell is at least as bright as the
/// grid's own mean.
fn average_hash(gray: &[f64], width: u32, height: u32, grid: u32) -> String {
    let reduced = resize_nearest(gray, width, height, grid, grid);
    let average = mean(&reduced);
    reduced
        .iter()
        .map(|&v| if v >= average { '1' } else { '0' })
        .collect()
}

/// Sign of adjacent-cell brightness differences over a (grid+1) x grid
/// downsample, row-major.
fn difference_hash(gray: &[f64], width: u32, height: u32, grid: u32) -> String {
    let reduced = resize_nearest(gray, width, height, grid + 1, grid);
    let stride = (grid + 1) as usize;
    let mut hash = String::with_capacity((grid * grid) as usize);

    for y in 0..grid as usize {
        for x in 0..grid as usize {
            let left = reduced[y * stride + x];
            let right = reduced[y * stride + x + 1];
            hash.push(if left > right { '1' } else { '0' });
        }
    }
    hash
}

fn histogram(gray: &[f64], bins: u32) -> Vec<f64> {
    if gray.is_empty() {
        return vec![0.0; bins as usize];
    }
    let mut counts = vec![0u64; bins as usize];

    for &value in gray {
        let bucket = ((value / 256.0 * bins as f64) as usize).min(bins as usize - 1);
        counts[bucket] += 1;
    }

    let total = gray.len() as f64;
    counts
        .iter()
        .map(|&count| round_places(count as f64 / total, 6))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FrameSource, SyntheticSource};

    fn uniform_frame(width: u32, height: u32, value: u8) -> Frame {
        let pixels = (0..width * height)
            .flat_map(|_| [value, value, value, 255])
            .collect();
        Frame::new(width, height, pixels)
    }

    #[test]
    fn empty_frame_means_camera_not_ready() {
        let frame = Frame::new(0, 0, Vec::new());
        let err = extract_features(&frame, &CaptureConfig::default()).unwrap_err();
        assert!(matches!(err, EyeScanError::CameraNotReady));
    }

    #[test]
    fn feature_dimensions_match_config() {
        let config = CaptureConfig::default();
        let frame = SyntheticSource::new(42, 320, 240).next_frame().unwrap();
        let features = extract_features(&frame, &config).unwrap();

        assert_eq!(features.hash.len(), 256);
        assert_eq!(features.diff_hash.len(), 256);
        assert_eq!(features.hist.len(), 16);
        assert!(features.hash.chars().all(|c| c == '0' || c == '1'));
        assert!(features.diff_hash.chars().all(|c| c == '0' || c == '1'));

        let total: f64 = features.hist.iter().sum();
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn extraction_is_deterministic() {
        let config = CaptureConfig::default();
        let frame = SyntheticSource::new(7, 640, 480).next_frame().unwrap();
        let a = extract_features(&frame, &config).unwrap();
        let b = extract_features(&frame, &config).unwrap();

        assert_eq!(a.hash, b.hash);
        assert_eq!(a.diff_hash, b.diff_hash);
        assert_eq!(a.hist, b.hist);
        assert_eq!(a.quality, b.quality);
    }

    #[test]
    fn flat_frame_has_no_contrast_or_sharpness() {
        let config = CaptureConfig::default();
        let frame = uniform_frame(300, 300, 125);
        let features = extract_features(&frame, &config).unwrap();

        assert_eq!(features.stats.contrast, 0.0);
        assert_eq!(features.stats.sharpness, 0.0);
        // Only the brightness factor contributes: 100 * 0.3
        assert_eq!(features.quality, 30);
        // Every luma value lands in one bucket
        assert_eq!(features.hist.iter().filter(|&&v| v > 0.0).count(), 1);
        // No structure to hash: all cells agree, no gradients anywhere
        let first = features.hash.chars().next().unwrap();
        assert!(features.hash.chars().all(|c| c == first));
        assert!(features.diff_hash.chars().all(|c| c == '0'));
    }

    #[test]
    fn quality_rewards_midrange_exposure() {
        // Perfect exposure, strong contrast and sharpness saturate the score
        assert_eq!(quality_score(125.0, 50.0, 20.0), 100);
        // Gross overexposure zeroes the brightness factor
        assert_eq!(quality_score(255.0, 50.0, 20.0), 70);
        // A dark, flat, blurry frame scores near zero
        assert!(quality_score(10.0, 2.0, 0.5) < 15);
    }
}
