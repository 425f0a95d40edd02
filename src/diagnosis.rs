use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::classify::classify;
use crate::codec;
use crate::engine::Classifier;
use crate::error::PipelineError;
use crate::models::{DiagnosisRequest, DiagnosisResult};

/// Owns the single engine call per request and turns its answer into a
/// finished [`DiagnosisResult`]. No retries and no caching.
pub struct DiagnosisClient {
    engine: Arc<dyn Classifier>,
    timeout: Duration,
}

impl DiagnosisClient {
    pub fn new(engine: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub async fn diagnose(&self, request: &DiagnosisRequest) -> Result<DiagnosisResult, PipelineError> {
        codec::check_payload(&request.payload)?;

        let started = Instant::now();
        let verdict = match tokio::time::timeout(self.timeout, self.engine.judge(request)).await {
            Ok(answer) => answer?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "inference engine timed out");
                return Err(PipelineError::InferenceUnavailable(format!(
                    "no answer within {:?}",
                    self.timeout
                )));
            }
        };

        if !verdict.is_classifiable() {
            return Err(PipelineError::MalformedEngineResponse(
                "verdict has neither disease_detected nor disease_type".into(),
            ));
        }

        let diagnosis = classify(verdict, Utc::now());
        info!(
            outcome = diagnosis.outcome.kind().as_str(),
            confidence = diagnosis.outcome.confidence(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ Disease detection completed"
        );
        Ok(diagnosis.into())
    }
}
