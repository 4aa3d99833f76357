pub mod capture;
pub mod features;
pub mod identify;
pub mod matcher;
pub mod template;

pub use capture::{CancelToken, CaptureSession, CaptureState, CapturedScan};
pub use features::{extract_features, FrameFeatures};
pub use identify::{identify, Candidate, Match};
pub use matcher::{verify, VerifyOutcome};
pub use template::{create_template, decode_scan, scan_quality, ScanPayload, ScanStats, Template};

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; zero for fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub(crate) fn round_places(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn std_dev_population() {
        // Population std dev of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn round_places_truncates_noise() {
        assert_eq!(round_places(0.123456789, 6), 0.123457);
        assert_eq!(round_places(12.345, 2), 12.35);
    }
}
