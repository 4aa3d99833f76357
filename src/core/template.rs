use crate::core::round_places;
use crate::error::{EyeScanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const TEMPLATE_FORMAT: &str = "eye-scan-v1";
pub const TEMPLATE_VERSION: u32 = 1;

/// Per-scan luma statistics, rounded to two decimals on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
}

/// A validated structured biometric template.
///
/// Field order matters: `encode` must produce the canonical `eye-scan-v1`
/// layout the original clients emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub format: String,
    pub version: u32,
    pub hash: String,
    #[serde(rename = "diffHash")]
    pub diff_hash: String,
    pub hist: Vec<f64>,
    pub quality: u8,
    pub stats: ScanStats,
}

/// A scan payload resolved once at decode time: either a validated
/// structured template or an opaque legacy string compared through the
/// digest fallback path.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPayload {
    Structured(Template),
    Legacy(String),
}

impl ScanPayload {
    pub fn as_structured(&self) -> Option<&Template> {
        match self {
            ScanPayload::Structured(template) => Some(template),
            ScanPayload::Legacy(_) => None,
        }
    }
}

/// Resolve a raw payload into a structured template or a legacy string.
/// Validation failures never error; they downgrade to `Legacy`.
pub fn decode_scan(payload: &str) -> ScanPayload {
    match parse_structured(payload) {
        Some(template) => ScanPayload::Structured(template),
        None => ScanPayload::Legacy(payload.to_string()),
    }
}

/// Canonical JSON serialization of a validated template.
pub fn encode(template: &Template) -> String {
    // Serialization of a plain struct cannot fail
    serde_json::to_string(template).unwrap_or_default()
}

/// Build the storable template for an enrollment payload: structured scans
/// are re-serialized canonically, anything else becomes a one-way digest.
pub fn create_template(payload: &str) -> Result<String> {
    if payload.trim().is_empty() {
        return Err(EyeScanError::InvalidScan("Scan data is required".into()));
    }

    match decode_scan(payload) {
        ScanPayload::Structured(template) => Ok(encode(&template)),
        ScanPayload::Legacy(raw) => Ok(normalized_hash(&raw)),
    }
}

/// Quality of a structured payload, `None` when the payload is legacy.
pub fn scan_quality(payload: &str) -> Option<u8> {
    parse_structured(payload).map(|template| template.quality)
}

/// SHA-256 hex digest used for legacy templates.
pub fn normalized_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn parse_structured(payload: &str) -> Option<Template> {
    let trimmed = payload.trim();
    // A bare digest never starts like a JSON object; skip the parse attempt
    if !trimmed.starts_with('{') {
        return None;
    }

    let raw: Value = serde_json::from_str(trimmed).ok()?;
    template_from_value(&raw)
}

fn template_from_value(raw: &Value) -> Option<Template> {
    if raw.get("format").and_then(Value::as_str) != Some(TEMPLATE_FORMAT) {
        return None;
    }

    let hash = raw.get("hash").and_then(Value::as_str).unwrap_or("");
    let diff_hash = raw.get("diffHash").and_then(Value::as_str).unwrap_or("");
    if !is_bit_string(hash) || !is_bit_string(diff_hash) {
        return None;
    }

    let hist = sanitize_histogram(raw.get("hist"))?;
    let stats = sanitize_stats(raw.get("stats"))?;

    let quality = raw
        .get("quality")
        .and_then(Value::as_f64)
        .filter(|q| q.is_finite())
        .unwrap_or(0.0)
        .round()
        .clamp(0.0, 100.0) as u8;

    Some(Template {
        format: TEMPLATE_FORMAT.to_string(),
        version: TEMPLATE_VERSION,
        hash: hash.to_string(),
        diff_hash: diff_hash.to_string(),
        hist,
        quality,
        stats,
    })
}

fn is_bit_string(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b == b'0' || b == b'1')
}

/// At least four finite non-negative bins summing to a positive total,
/// renormalized to sum to 1.
fn sanitize_histogram(value: Option<&Value>) -> Option<Vec<f64>> {
    let entries = value?.as_array()?;
    if entries.len() < 4 {
        return None;
    }

    let mut values = Vec::with_capacity(entries.len());
    for entry in entries {
        let value = entry.as_f64()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        values.push(value);
    }

    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return None;
    }

    Some(
        values
            .iter()
            .map(|v| round_places(v / total, 6))
            .collect(),
    )
}

fn sanitize_stats(value: Option<&Value>) -> Option<ScanStats> {
    let stats = value?.as_object()?;

    let brightness = stats.get("brightness").and_then(Value::as_f64)?;
    let contrast = stats.get("contrast").and_then(Value::as_f64)?;
    let sharpness = stats.get("sharpness").and_then(Value::as_f64)?;

    if ![brightness, contrast, sharpness].iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(ScanStats {
        brightness: round_places(brightness, 2),
        contrast: round_places(contrast, 2),
        sharpness: round_places(sharpness, 2),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_template() -> Template {
        Template {
            format: TEMPLATE_FORMAT.to_string(),
            version: TEMPLATE_VERSION,
            hash: "1010".repeat(64),
            diff_hash: "0110".repeat(64),
            hist: vec![0.0625; 16],
            quality: 85,
            stats: ScanStats {
                brightness: 120.5,
                contrast: 42.25,
                sharpness: 11.75,
            },
        }
    }

    #[test]
    fn round_trips_through_the_wire_format() {
        let template = sample_template();
        let encoded = encode(&template);
        match decode_scan(&encoded) {
            ScanPayload::Structured(decoded) => assert_eq!(decoded, template),
            ScanPayload::Legacy(_) => panic!("round trip lost structure"),
        }
    }

    #[test]
    fn decode_tolerates_extra_wire_fields() {
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["samples"] = Value::from(7);
        value["capturedAt"] = Value::from("2024-03-01T09:30:00.000Z");

        let payload = format!("  {}  ", value);
        assert!(matches!(decode_scan(&payload), ScanPayload::Structured(_)));
    }

    #[test]
    fn bare_digest_is_legacy() {
        let digest = normalized_hash("some-old-scan");
        assert_eq!(digest.len(), 64);
        assert!(matches!(decode_scan(&digest), ScanPayload::Legacy(_)));
    }

    #[test]
    fn wrong_format_tag_is_legacy() {
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["format"] = Value::from("eye-scan-v2");
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));
    }

    #[test]
    fn malformed_bit_strings_are_legacy() {
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["hash"] = Value::from("10a1");
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));

        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["diffHash"] = Value::from("");
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));
    }

    #[test]
    fn histogram_rules_are_enforced() {
        // Too few bins
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["hist"] = serde_json::json!([0.5, 0.3, 0.2]);
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));

        // Negative bin
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["hist"] = serde_json::json!([0.5, 0.3, 0.3, -0.1]);
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));

        // Non-numeric bin
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["hist"] = serde_json::json!([0.25, 0.25, "0.25", 0.25]);
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));

        // All-zero histogram has no mass to normalize
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["hist"] = serde_json::json!([0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));
    }

    #[test]
    fn unnormalized_histogram_is_rescaled() {
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["hist"] = serde_json::json!([2.0, 2.0, 2.0, 2.0]);

        match decode_scan(&value.to_string()) {
            ScanPayload::Structured(template) => {
                assert_eq!(template.hist, vec![0.25; 4]);
            }
            ScanPayload::Legacy(_) => panic!("histogram should rescale, not reject"),
        }
    }

    #[test]
    fn quality_is_clamped_on_decode() {
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["quality"] = Value::from(150);
        match decode_scan(&value.to_string()) {
            ScanPayload::Structured(template) => assert_eq!(template.quality, 100),
            ScanPayload::Legacy(_) => panic!("quality overflow should clamp, not reject"),
        }

        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value.as_object_mut().unwrap().remove("quality");
        match decode_scan(&value.to_string()) {
            ScanPayload::Structured(template) => assert_eq!(template.quality, 0),
            ScanPayload::Legacy(_) => panic!("missing quality defaults to 0"),
        }
    }

    #[test]
    fn missing_stats_field_is_legacy() {
        let mut value: Value = serde_json::from_str(&encode(&sample_template())).unwrap();
        value["stats"].as_object_mut().unwrap().remove("sharpness");
        assert!(matches!(decode_scan(&value.to_string()), ScanPayload::Legacy(_)));
    }

    #[test]
    fn create_template_canonicalizes_or_digests() {
        let template = sample_template();
        let stored = create_template(&encode(&template)).unwrap();
        assert_eq!(
            decode_scan(&stored).as_structured().unwrap(),
            &template
        );

        let stored = create_template("opaque legacy scan blob").unwrap();
        assert_eq!(stored, normalized_hash("opaque legacy scan blob"));

        assert!(create_template("   ").is_err());
    }

    #[test]
    fn scan_quality_reports_structured_only() {
        let template = sample_template();
        assert_eq!(scan_quality(&encode(&template)), Some(85));
        assert_eq!(scan_quality("deadbeef"), None);
    }
}
