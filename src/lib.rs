// Core modules
pub mod camera;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use camera::{Frame, FrameSource, ImageFileSource, SyntheticSource};
pub use config::{CaptureConfig, Config, MatcherConfig, StorageConfig};
pub use core::{
    create_template, decode_scan, extract_features, identify, scan_quality, verify, CancelToken,
    Candidate, CaptureSession, CaptureState, CapturedScan, FrameFeatures, Match, ScanPayload,
    ScanStats, Template, VerifyOutcome,
};
pub use error::{EyeScanError, Result};
pub use storage::{EnrollmentRecord, EnrollmentStore, Eye};
