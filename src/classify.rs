//! Turns a raw engine verdict into exactly one [`Outcome`].
//!
//! Precedence, first match wins:
//! 1. `disease_type == "invalid_image"`, even when `disease_detected` is true
//! 2. `disease_detected == true`
//! 3. `disease_detected == false`
//! 4. no flag: a disease category in `disease_type` means diseased, anything else healthy
//!
//! Missing fields become empty lists, `"N/A"` or a confidence of 0.

use chrono::{DateTime, Utc};

use crate::models::{Diagnosis, DiseaseType, EngineVerdict, Outcome, Severity, INVALID_IMAGE, NOT_APPLICABLE};

const DEFAULT_ISSUE: &str = "The photo could not be analysed as a plant leaf.";
const DEFAULT_REMEDIATION: [&str; 2] = [
    "Retake photo of a leaf, filling the frame with a single leaf.",
    "Use even natural light and keep the leaf in focus.",
];

pub fn classify(verdict: EngineVerdict, now: DateTime<Utc>) -> Diagnosis {
    let EngineVerdict {
        disease_detected,
        disease_name,
        disease_type,
        severity,
        confidence,
        symptoms,
        possible_causes,
        treatment,
    } = verdict;

    let confidence = normalize_confidence(confidence);
    let raw_type = disease_type.as_deref().unwrap_or_default();
    let parsed_type = DiseaseType::parse(raw_type);

    let is_invalid = raw_type.trim().eq_ignore_ascii_case(INVALID_IMAGE);
    let is_diseased = match disease_detected {
        Some(flag) => flag,
        None => parsed_type.is_some(),
    };

    let outcome = if is_invalid {
        Outcome::InvalidImage {
            confidence,
            issues: or_default(clean(symptoms), &[DEFAULT_ISSUE]),
            remediation: or_default(clean(treatment), &DEFAULT_REMEDIATION),
        }
    } else if is_diseased {
        Outcome::Diseased {
            name: text_or_na(disease_name),
            disease_type: parsed_type.unwrap_or(DiseaseType::Other),
            severity: severity.as_deref().and_then(Severity::parse),
            confidence,
            symptoms: clean(symptoms),
            possible_causes: clean(possible_causes),
            treatment: clean(treatment),
        }
    } else {
        Outcome::Healthy {
            confidence,
            observations: clean(symptoms),
            care: clean(treatment),
        }
    };

    Diagnosis {
        outcome,
        analysis_timestamp: now,
    }
}

fn normalize_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(c) if c.is_finite() => c.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

fn clean(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn or_default(items: Vec<String>, fallback: &[&str]) -> Vec<String> {
    if items.is_empty() {
        fallback.iter().map(|s| s.to_string()).collect()
    } else {
        items
    }
}

fn text_or_na(text: Option<String>) -> String {
    match text.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => NOT_APPLICABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiagnosisResult, OutcomeKind, HEALTHY};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn strings(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn fungal_verdict_becomes_diseased() {
        let verdict = EngineVerdict {
            disease_detected: Some(true),
            disease_name: Some("Leaf Spot".into()),
            disease_type: Some("fungal".into()),
            severity: Some("Moderate".into()),
            confidence: Some(87.0),
            symptoms: strings(&["circular brown lesions", " "]),
            possible_causes: strings(&["high humidity"]),
            treatment: strings(&["remove infected leaves", "apply copper fungicide"]),
        };

        let result = DiagnosisResult::from(classify(verdict, at()));
        assert_eq!(
            result,
            DiagnosisResult {
                disease_detected: true,
                disease_name: "Leaf Spot".into(),
                disease_type: "fungal".into(),
                severity: "moderate".into(),
                confidence: 87.0,
                symptoms: vec!["circular brown lesions".into()],
                possible_causes: vec!["high humidity".into()],
                treatment: vec!["remove infected leaves".into(), "apply copper fungicide".into()],
                analysis_timestamp: "2025-05-01T12:00:00+00:00".into(),
            }
        );
    }

    #[test]
    fn contradictory_verdict_is_invalid_image() {
        let verdict = EngineVerdict {
            disease_detected: Some(true),
            disease_type: Some("invalid_image".into()),
            confidence: Some(95.0),
            ..Default::default()
        };
        let diagnosis = classify(verdict, at());
        assert_eq!(diagnosis.outcome.kind(), OutcomeKind::InvalidImage);

        let result = DiagnosisResult::from(diagnosis);
        assert!(!result.disease_detected);
        assert_eq!(result.disease_type, INVALID_IMAGE);
        assert_eq!(result.outcome_kind(), OutcomeKind::InvalidImage);
    }

    #[test]
    fn invalid_image_always_carries_remediation() {
        let verdict = EngineVerdict {
            disease_detected: Some(false),
            disease_type: Some("INVALID_IMAGE".into()),
            confidence: Some(99.0),
            ..Default::default()
        };
        let result = DiagnosisResult::from(classify(verdict, at()));
        assert_eq!(result.symptoms, vec![DEFAULT_ISSUE.to_string()]);
        assert!(result.treatment[0].starts_with("Retake photo of a leaf"));
        assert!(result.possible_causes.is_empty());
        assert_eq!(result.disease_name, NOT_APPLICABLE);
        assert_eq!(result.severity, NOT_APPLICABLE);
    }

    #[test]
    fn engine_remediation_is_kept() {
        let verdict = EngineVerdict {
            disease_type: Some("invalid_image".into()),
            symptoms: strings(&["image shows a dog"]),
            treatment: strings(&["Please upload a photo of a plant leaf"]),
            ..Default::default()
        };
        let result = DiagnosisResult::from(classify(verdict, at()));
        assert_eq!(result.symptoms, vec!["image shows a dog".to_string()]);
        assert_eq!(result.treatment, vec!["Please upload a photo of a plant leaf".to_string()]);
    }

    #[test]
    fn healthy_verdict_fills_sentinels() {
        let verdict = EngineVerdict {
            disease_detected: Some(false),
            disease_type: Some("fungal".into()),
            disease_name: Some("should be ignored".into()),
            possible_causes: strings(&["ignored"]),
            confidence: Some(92.5),
            ..Default::default()
        };
        let result = DiagnosisResult::from(classify(verdict, at()));
        assert_eq!(result.outcome_kind(), OutcomeKind::Healthy);
        assert_eq!(result.disease_type, HEALTHY);
        assert_eq!(result.disease_name, NOT_APPLICABLE);
        assert_eq!(result.severity, NOT_APPLICABLE);
        assert!(result.possible_causes.is_empty());
        assert_eq!(result.confidence, 92.5);
    }

    #[test]
    fn missing_flag_falls_back_to_type() {
        let diseased = EngineVerdict {
            disease_type: Some("bacterial".into()),
            ..Default::default()
        };
        assert_eq!(classify(diseased, at()).outcome.kind(), OutcomeKind::Diseased);

        let healthy = EngineVerdict {
            disease_type: Some("healthy".into()),
            ..Default::default()
        };
        assert_eq!(classify(healthy, at()).outcome.kind(), OutcomeKind::Healthy);
    }

    #[test]
    fn diseased_without_details_uses_defaults() {
        let verdict = EngineVerdict {
            disease_detected: Some(true),
            severity: Some("catastrophic".into()),
            ..Default::default()
        };
        let result = DiagnosisResult::from(classify(verdict, at()));
        assert_eq!(result.disease_name, NOT_APPLICABLE);
        assert_eq!(result.disease_type, "other");
        assert_eq!(result.severity, NOT_APPLICABLE);
        assert_eq!(result.confidence, 0.0);
        assert!(result.symptoms.is_empty());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(normalize_confidence(Some(140.0)), 100.0);
        assert_eq!(normalize_confidence(Some(-3.0)), 0.0);
        assert_eq!(normalize_confidence(Some(f64::NAN)), 0.0);
        assert_eq!(normalize_confidence(None), 0.0);
    }

    #[test]
    fn every_verdict_lands_in_exactly_one_variant() {
        let flags = [None, Some(true), Some(false)];
        let types = [None, Some("invalid_image"), Some("healthy"), Some("viral"), Some("")];
        for flag in flags {
            for kind in types {
                let verdict = EngineVerdict {
                    disease_detected: flag,
                    disease_type: kind.map(str::to_string),
                    ..Default::default()
                };
                let result = DiagnosisResult::from(classify(verdict, at()));
                let predicates = [
                    result.disease_type == INVALID_IMAGE,
                    !result.disease_detected && result.disease_type != INVALID_IMAGE,
                    result.disease_detected,
                ];
                assert_eq!(predicates.iter().filter(|p| **p).count(), 1, "{flag:?} {kind:?}");
                assert!(!result.analysis_timestamp.is_empty());
            }
        }
    }
}
