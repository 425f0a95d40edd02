use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::DiagnosisResult;

/// What the detection endpoint hands back: a complete result or an explicit
/// error, never an empty success.
#[derive(Debug)]
pub enum Envelope {
    Success(DiagnosisResult),
    Failure(PipelineError),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: String,
    pub error_id: Uuid,
}

impl From<Result<DiagnosisResult, PipelineError>> for Envelope {
    fn from(result: Result<DiagnosisResult, PipelineError>) -> Self {
        match result {
            Ok(diagnosis) => Envelope::Success(diagnosis),
            Err(err) => Envelope::Failure(err),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        match self {
            Envelope::Success(diagnosis) => (StatusCode::OK, Json(diagnosis)).into_response(),
            Envelope::Failure(err) => err.into_response(),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status();

        if self.is_client_error() {
            tracing::warn!(error_id = %error_id, code = self.code(), error = %self, "request rejected");
        } else {
            tracing::error!(error_id = %error_id, code = self.code(), error = %self, "request failed");
        }

        let body = ErrorBody {
            detail: self.public_detail(),
            code: self.code().to_string(),
            error_id,
        };
        (status, Json(body)).into_response()
    }
}

/// Panic hook for `CatchPanicLayer`: the panic message stays in the logs.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    PipelineError::Internal(message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RejectionReason;
    use axum::body::to_bytes;

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_error_keeps_reason() {
        let response = Envelope::from(Err(PipelineError::from(RejectionReason::EmptyInput))).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["detail"], "File is empty");
        assert_eq!(body["code"], "EMPTY_INPUT");
        assert!(body["error_id"].is_string());
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let response = PipelineError::InferenceUnavailable("api key gsk_secret rejected".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(!body["detail"].as_str().unwrap().contains("gsk_secret"));
        assert_eq!(body["code"], "INFERENCE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn panic_becomes_generic_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(!body["detail"].as_str().unwrap().contains("boom"));
    }
}
