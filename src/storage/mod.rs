use crate::core::template::{create_template, scan_quality};
use crate::error::{EyeScanError, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const STORAGE_VERSION: u32 = 1;

/// Which eye was enrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Eye {
    Left,
    #[default]
    Right,
}

/// One enrolled user's stored template plus bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub version: u32,
    pub username: String,
    /// Structured `eye-scan-v1` JSON or a legacy digest string
    pub template: String,
    pub eye: Eye,
    /// Quality reported by the scan; 0 for legacy templates
    pub quality: u8,
    pub is_active: bool,
    pub enrolled_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

/// One bincode file per enrolled user.
pub struct EnrollmentStore {
    data_dir: PathBuf,
}

impl EnrollmentStore {
    pub fn new_with_dir(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// Open the store at the platform data directory, or at an explicit
    /// override when one is given.
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => {
                let dirs = ProjectDirs::from("com", "eyegate", "EyeGate")
                    .ok_or_else(|| EyeScanError::Storage("Failed to get project dirs".into()))?;
                dirs.data_dir().join("enrollments")
            }
        };
        Self::new_with_dir(data_dir)
    }

    fn record_path(&self, username: &str) -> Result<PathBuf> {
        if username.is_empty() || username.contains('/') || username.contains('\\') {
            return Err(EyeScanError::Storage(format!(
                "Invalid username: {:?}",
                username
            )));
        }
        Ok(self.data_dir.join(format!("{}.bincode", username)))
    }

    /// Create or replace the enrollment for a user. Re-enrolling replaces
    /// the template, refreshes the quality and reactivates the record.
    pub fn enroll(&self, username: &str, scan_data: &str, eye: Eye) -> Result<EnrollmentRecord> {
        let template = create_template(scan_data)?;
        let quality = scan_quality(scan_data).unwrap_or(0);

        let record = EnrollmentRecord {
            version: STORAGE_VERSION,
            username: username.to_string(),
            template,
            eye,
            quality,
            is_active: true,
            enrolled_at: Utc::now(),
            last_used: None,
        };
        self.save(&record)?;
        Ok(record)
    }

    pub fn save(&self, record: &EnrollmentRecord) -> Result<()> {
        let path = self.record_path(&record.username)?;
        let encoded = bincode::serialize(record)
            .map_err(|e| EyeScanError::Storage(format!("Failed to serialize: {}", e)))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn get(&self, username: &str) -> Result<EnrollmentRecord> {
        let path = self.record_path(username)?;
        if !path.exists() {
            return Err(EyeScanError::UserNotFound(username.to_string()));
        }

        let data = fs::read(path)?;
        let mut record: EnrollmentRecord = bincode::deserialize(&data)
            .map_err(|e| EyeScanError::Storage(format!("Failed to deserialize: {}", e)))?;

        if record.version < STORAGE_VERSION {
            record.version = STORAGE_VERSION;
        }

        Ok(record)
    }

    pub fn remove(&self, username: &str) -> Result<()> {
        let path = self.record_path(username)?;
        if !path.exists() {
            return Err(EyeScanError::UserNotFound(username.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// Soft-disable an enrollment without deleting the template.
    pub fn deactivate(&self, username: &str) -> Result<()> {
        let mut record = self.get(username)?;
        record.is_active = false;
        self.save(&record)
    }

    pub fn mark_used(&self, username: &str) -> Result<()> {
        let mut record = self.get(username)?;
        record.last_used = Some(Utc::now());
        self.save(&record)
    }

    /// All enrollment records, sorted by username so scan order is
    /// reproducible across runs.
    pub fn list(&self) -> Result<Vec<EnrollmentRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bincode") {
                continue;
            }

            let data = fs::read(&path)?;
            let record: EnrollmentRecord = bincode::deserialize(&data).map_err(|e| {
                EyeScanError::Storage(format!("Corrupt record {}: {}", path.display(), e))
            })?;
            records.push(record);
        }

        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(records)
    }
}
