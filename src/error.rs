use thiserror::Error;

#[derive(Error, Debug)]
pub enum EyeScanError {
    #[error("Camera is not ready yet")]
    CameraNotReady,

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Invalid scan data: {0}")]
    InvalidScan(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EyeScanError>;
