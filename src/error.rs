use axum::http::StatusCode;
use thiserror::Error;

use crate::{codec::CodecError, engine::EngineError, ingest::RejectionReason};

/// Everything that can stop a detection request. Client mistakes keep their
/// reason on the wire; processing failures are reported generically and only
/// logged in detail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No file provided")]
    MissingFile,

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error(transparent)]
    Rejected(#[from] RejectionReason),

    #[error("Encoding error: {0}")]
    Encoding(#[from] CodecError),

    #[error("Inference engine unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Malformed engine response: {0}")]
    MalformedEngineResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::MissingFile | PipelineError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            PipelineError::Rejected(RejectionReason::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::Rejected(_) => StatusCode::BAD_REQUEST,
            PipelineError::Encoding(_)
            | PipelineError::InferenceUnavailable(_)
            | PipelineError::MalformedEngineResponse(_)
            | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::MissingFile => "MISSING_FILE",
            PipelineError::MalformedUpload(_) => "MALFORMED_UPLOAD",
            PipelineError::Rejected(RejectionReason::EmptyInput) => "EMPTY_INPUT",
            PipelineError::Rejected(RejectionReason::UnsupportedType { .. }) => "UNSUPPORTED_TYPE",
            PipelineError::Rejected(RejectionReason::TooLarge { .. }) => "TOO_LARGE",
            PipelineError::Encoding(_) => "ENCODING_ERROR",
            PipelineError::InferenceUnavailable(_) => "INFERENCE_UNAVAILABLE",
            PipelineError::MalformedEngineResponse(_) => "MALFORMED_ENGINE_RESPONSE",
            PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Text safe to send to the caller.
    pub fn public_detail(&self) -> String {
        match self {
            PipelineError::MissingFile
            | PipelineError::MalformedUpload(_)
            | PipelineError::Rejected(_) => self.to_string(),
            PipelineError::Encoding(_)
            | PipelineError::InferenceUnavailable(_)
            | PipelineError::MalformedEngineResponse(_) => {
                "Failed to process image file. Please try again.".to_string()
            }
            PipelineError::Internal(_) => "Internal server error. Please try again later.".to_string(),
        }
    }
}

impl From<EngineError> for PipelineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Http(msg) => PipelineError::InferenceUnavailable(msg),
            EngineError::Malformed(msg) => PipelineError::MalformedEngineResponse(msg),
        }
    }
}
