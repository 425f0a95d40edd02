use bytes::Bytes;
use thiserror::Error;

use crate::models::{ImageType, ValidImage};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("File is empty")]
    EmptyInput,
    #[error("Invalid file type '{declared}'. Supported: image/jpeg, image/png, image/webp")]
    UnsupportedType { declared: String },
    #[error("File size exceeds maximum limit of {}", human_size(.limit))]
    TooLarge { limit: usize },
}

fn human_size(bytes: &usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    match *bytes {
        b if b >= MIB && b % MIB == 0 => format!("{}MB", b / MIB),
        b if b >= KIB && b % KIB == 0 => format!("{}KB", b / KIB),
        b => format!("{} bytes", b),
    }
}

/// Length and declared-type checks on an upload. Never looks inside the bytes.
#[derive(Debug, Clone, Copy)]
pub struct ImageIngestor {
    max_bytes: usize,
}

impl Default for ImageIngestor {
    fn default() -> Self {
        Self::new(MAX_IMAGE_BYTES)
    }
}

impl ImageIngestor {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Type is checked first so an unsupported upload is rejected as such
    /// whatever its size.
    pub fn validate(
        &self,
        bytes: Bytes,
        declared_content_type: Option<&str>,
    ) -> Result<ValidImage, RejectionReason> {
        let image_type = self.check_type(declared_content_type)?;
        self.check_length(bytes, image_type)
    }

    /// Declared-type half of [`validate`](Self::validate), usable before the
    /// body has been read.
    pub fn check_type(&self, declared_content_type: Option<&str>) -> Result<ImageType, RejectionReason> {
        let declared = declared_content_type.unwrap_or_default();
        ImageType::from_mime(declared).ok_or_else(|| RejectionReason::UnsupportedType {
            declared: if declared.is_empty() { "unknown".to_string() } else { declared.to_string() },
        })
    }

    pub fn check_length(&self, bytes: Bytes, image_type: ImageType) -> Result<ValidImage, RejectionReason> {
        if bytes.is_empty() {
            return Err(RejectionReason::EmptyInput);
        }
        if bytes.len() > self.max_bytes {
            return Err(RejectionReason::TooLarge { limit: self.max_bytes });
        }

        Ok(ValidImage { bytes, image_type })
    }
}
