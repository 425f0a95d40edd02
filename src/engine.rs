use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::codec;
use crate::config::EngineSettings;
use crate::models::{DiagnosisRequest, EngineVerdict};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Malformed: {0}")] Malformed(String),
}

/// The inference engine as the pipeline sees it: one image in, one verdict out.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn judge(&self, request: &DiagnosisRequest) -> Result<EngineVerdict, EngineError>;
}

const DIAGNOSIS_PROMPT: &str = "\
You are an expert plant pathologist. Examine the attached photo and answer with a single JSON object \
and nothing else, using exactly these keys:
{
  \"disease_detected\": boolean,
  \"disease_name\": string,
  \"disease_type\": one of \"fungal\", \"bacterial\", \"viral\", \"pest\", \"nutrient_deficiency\", \"environmental\", \"healthy\", \"invalid_image\",
  \"severity\": one of \"mild\", \"moderate\", \"severe\",
  \"confidence\": number between 0 and 100,
  \"symptoms\": array of strings,
  \"possible_causes\": array of strings,
  \"treatment\": array of strings
}
If the photo does not show a plant leaf, or is too blurry, dark or distant to judge, set \"disease_type\" to \
\"invalid_image\" and \"disease_detected\" to false, describe what is wrong with the photo in \"symptoms\" and \
tell the user how to retake it in \"treatment\".
If the leaf is healthy, set \"disease_detected\" to false and \"disease_type\" to \"healthy\".";

// Shortens inline image payloads in a JSON document before it is logged
fn redact_image_payloads(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "url" {
                    if let serde_json::Value::String(s) = val {
                        if s.starts_with("data:") && s.len() > 100 {
                            *val = serde_json::Value::String(codec::preview(s));
                        }
                    }
                } else {
                    redact_image_payloads(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                redact_image_payloads(val);
            }
        }
        _ => {}
    }
}

/// Groq's OpenAI-compatible chat completions endpoint with a vision model.
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqClient {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        }
    }

    fn request_body(&self, request: &DiagnosisRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": DIAGNOSIS_PROMPT},
                    {"type": "image_url", "image_url": {"url": request.data_url()}}
                ]
            }],
            "temperature": 0.3,
            "max_completion_tokens": 1024,
            "response_format": {"type": "json_object"}
        })
    }

    async fn perform_api_call(&self, body: &serde_json::Value) -> Result<String, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);
        info!("🔗 Making request to: {} (model {})", url, self.model);

        let mut logged = body.clone();
        redact_image_payloads(&mut logged);
        info!("📤 Request body: {}", serde_json::to_string(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(EngineError::Http(format!("status={} body={}", status, error_body)));
        }

        response.text().await.map_err(|e| EngineError::Http(e.to_string()))
    }
}

#[async_trait]
impl Classifier for GroqClient {
    async fn judge(&self, request: &DiagnosisRequest) -> Result<EngineVerdict, EngineError> {
        info!(
            media_type = request.image_type.mime(),
            payload = %codec::preview(&request.payload),
            "Analyzing leaf image with vision model"
        );
        let body = self.request_body(request);
        let response_text = self.perform_api_call(&body).await?;
        let content = extract_message_content(&response_text)?;
        info!("📥 Model answer: {}", content);
        parse_verdict(&content)
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice { message: Message }

#[derive(Debug, Deserialize)]
struct Message { #[serde(default)] content: Option<String> }

fn extract_message_content(response_text: &str) -> Result<String, EngineError> {
    let parsed: ChatCompletion = serde_json::from_str(response_text)
        .map_err(|e| EngineError::Malformed(format!("completion parse error: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .find_map(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| EngineError::Malformed("no message content in response".into()))
}

/// Models sometimes wrap the object in code fences or a sentence; take the
/// outermost `{...}` span.
fn parse_verdict(content: &str) -> Result<EngineVerdict, EngineError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let object = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => return Err(EngineError::Malformed(format!("no JSON object in answer: {}", content))),
    };
    serde_json::from_str(object)
        .map_err(|e| EngineError::Malformed(format!("verdict parse error: {}: {}", e, object)))
}
