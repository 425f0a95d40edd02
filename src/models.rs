use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_with::{formats::PreferMany, serde_as, DeserializeAs, OneOrMany};

use crate::codec;

/// Sentinel `disease_type` for photos the engine refused to diagnose.
pub const INVALID_IMAGE: &str = "invalid_image";
/// Sentinel for text fields that do not apply to an outcome.
pub const NOT_APPLICABLE: &str = "N/A";
pub const HEALTHY: &str = "healthy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
}

impl ImageType {
    pub const SUPPORTED: [ImageType; 3] = [ImageType::Jpeg, ImageType::Png, ImageType::Webp];

    /// Matches a declared MIME type, ignoring parameters and case.
    pub fn from_mime(declared: &str) -> Option<Self> {
        let essence = declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        Self::SUPPORTED.into_iter().find(|t| t.mime() == essence)
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Webp => "image/webp",
        }
    }
}

/// Raw upload as received from the multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub filename: Option<String>, // advisory, only logged
}

/// An upload that passed ingest checks.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub bytes: Bytes,
    pub image_type: ImageType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub payload: String,
    pub image_type: ImageType,
}

impl DiagnosisRequest {
    /// Consumes the image; the raw bytes are dropped once encoded.
    pub fn from_image(image: ValidImage) -> Self {
        Self {
            payload: codec::encode(&image.bytes),
            image_type: image.image_type,
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.image_type.mime(), self.payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mild" | "low" => Some(Severity::Mild),
            "moderate" | "medium" => Some(Severity::Moderate),
            "severe" | "high" => Some(Severity::Severe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiseaseType {
    Fungal,
    Bacterial,
    Viral,
    Pest,
    NutrientDeficiency,
    Environmental,
    Other,
}

impl DiseaseType {
    /// Returns `None` for labels that name no disease at all ("healthy", "none", blank)
    /// and for the invalid-image sentinel.
    pub fn parse(raw: &str) -> Option<Self> {
        let label = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let kind = match label.as_str() {
            "" | "healthy" | "none" | "n/a" | "na" | INVALID_IMAGE => return None,
            "fungal" | "fungus" | "fungi" => DiseaseType::Fungal,
            "bacterial" | "bacteria" => DiseaseType::Bacterial,
            "viral" | "virus" => DiseaseType::Viral,
            "pest" | "pests" | "insect" | "insects" => DiseaseType::Pest,
            "nutrient_deficiency" | "nutritional" | "nutrient" | "deficiency" => {
                DiseaseType::NutrientDeficiency
            }
            "environmental" | "abiotic" | "physiological" => DiseaseType::Environmental,
            _ => DiseaseType::Other,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseType::Fungal => "fungal",
            DiseaseType::Bacterial => "bacterial",
            DiseaseType::Viral => "viral",
            DiseaseType::Pest => "pest",
            DiseaseType::NutrientDeficiency => "nutrient_deficiency",
            DiseaseType::Environmental => "environmental",
            DiseaseType::Other => "other",
        }
    }
}

/// The three mutually exclusive shapes a diagnosis can take. Each variant
/// carries only the fields that mean something for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    InvalidImage {
        confidence: f64,
        issues: Vec<String>,
        remediation: Vec<String>,
    },
    Healthy {
        confidence: f64,
        observations: Vec<String>,
        care: Vec<String>,
    },
    Diseased {
        name: String,
        disease_type: DiseaseType,
        severity: Option<Severity>,
        confidence: f64,
        symptoms: Vec<String>,
        possible_causes: Vec<String>,
        treatment: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    InvalidImage,
    Healthy,
    Diseased,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::InvalidImage => INVALID_IMAGE,
            OutcomeKind::Healthy => HEALTHY,
            OutcomeKind::Diseased => "diseased",
        }
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::InvalidImage { .. } => OutcomeKind::InvalidImage,
            Outcome::Healthy { .. } => OutcomeKind::Healthy,
            Outcome::Diseased { .. } => OutcomeKind::Diseased,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Outcome::InvalidImage { confidence, .. }
            | Outcome::Healthy { confidence, .. }
            | Outcome::Diseased { confidence, .. } => *confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub outcome: Outcome,
    pub analysis_timestamp: DateTime<Utc>,
}

/// Wire schema returned to callers. Every field is always present; callers
/// branch on [`DiagnosisResult::outcome_kind`] rather than on missing keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisResult {
    pub disease_detected: bool,
    pub disease_name: String,
    pub disease_type: String,
    pub severity: String,
    pub confidence: f64,
    pub symptoms: Vec<String>,
    pub possible_causes: Vec<String>,
    pub treatment: Vec<String>,
    pub analysis_timestamp: String,
}

impl DiagnosisResult {
    pub fn outcome_kind(&self) -> OutcomeKind {
        if self.disease_type == INVALID_IMAGE {
            OutcomeKind::InvalidImage
        } else if self.disease_detected {
            OutcomeKind::Diseased
        } else {
            OutcomeKind::Healthy
        }
    }
}

impl From<Diagnosis> for DiagnosisResult {
    fn from(diagnosis: Diagnosis) -> Self {
        let analysis_timestamp = diagnosis.analysis_timestamp.to_rfc3339();
        match diagnosis.outcome {
            Outcome::InvalidImage { confidence, issues, remediation } => DiagnosisResult {
                disease_detected: false,
                disease_name: NOT_APPLICABLE.to_string(),
                disease_type: INVALID_IMAGE.to_string(),
                severity: NOT_APPLICABLE.to_string(),
                confidence,
                symptoms: issues,
                possible_causes: Vec::new(),
                treatment: remediation,
                analysis_timestamp,
            },
            Outcome::Healthy { confidence, observations, care } => DiagnosisResult {
                disease_detected: false,
                disease_name: NOT_APPLICABLE.to_string(),
                disease_type: HEALTHY.to_string(),
                severity: NOT_APPLICABLE.to_string(),
                confidence,
                symptoms: observations,
                possible_causes: Vec::new(),
                treatment: care,
                analysis_timestamp,
            },
            Outcome::Diseased {
                name,
                disease_type,
                severity,
                confidence,
                symptoms,
                possible_causes,
                treatment,
            } => DiagnosisResult {
                disease_detected: true,
                disease_name: name,
                disease_type: disease_type.as_str().to_string(),
                severity: severity
                    .map(|s| s.as_str())
                    .unwrap_or(NOT_APPLICABLE)
                    .to_string(),
                confidence,
                symptoms,
                possible_causes,
                treatment,
                analysis_timestamp,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Native(T),
    Text(String),
}

/// Accepts `true`, `"true"`, `"True"`, `"yes"` and their negatives.
pub struct LooseBool;

impl<'de> DeserializeAs<'de, bool> for LooseBool {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Loose::<bool>::deserialize(deserializer)? {
            Loose::Native(value) => Ok(value),
            Loose::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(true),
                "false" | "no" => Ok(false),
                other => Err(de::Error::custom(format!("expected a boolean, got {other:?}"))),
            },
        }
    }
}

/// Accepts `87`, `"87"`, `"87.5"` and `"87%"`.
pub struct LooseNumber;

impl<'de> DeserializeAs<'de, f64> for LooseNumber {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Loose::<f64>::deserialize(deserializer)? {
            Loose::Native(value) => Ok(value),
            Loose::Text(text) => {
                let trimmed = text.trim().trim_end_matches('%').trim_end();
                trimmed
                    .parse()
                    .map_err(|_| de::Error::custom(format!("expected a number, got {text:?}")))
            }
        }
    }
}

/// Judgment as the vision model returns it. Models are loose with types, so
/// numbers and flags may arrive as text and lists as a single string.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineVerdict {
    #[serde_as(as = "Option<LooseBool>")]
    pub disease_detected: Option<bool>,
    pub disease_name: Option<String>,
    pub disease_type: Option<String>,
    pub severity: Option<String>,
    #[serde_as(as = "Option<LooseNumber>")]
    pub confidence: Option<f64>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub symptoms: Option<Vec<String>>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub possible_causes: Option<Vec<String>>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub treatment: Option<Vec<String>>,
}

impl EngineVerdict {
    /// A verdict with neither a detection flag nor a type says nothing we can
    /// classify; it is treated as a malformed engine answer.
    pub fn is_classifiable(&self) -> bool {
        self.disease_detected.is_some()
            || self
                .disease_type
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }
}
