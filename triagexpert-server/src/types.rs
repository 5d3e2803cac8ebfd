//! Request and response types for the triage API.
//!
//! These types are shared by the HTTP layer, the cache and the backends.
//! `TriageResponse` is the payload stored in the cache and returned verbatim
//! on every hit, so it must stay immutable once built.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Urgency assigned to a symptom report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriageCategory {
    Emergency,
    Urgent,
    Routine,
}

impl TriageCategory {
    /// Fixed scheduling rank: Emergency=1 < Urgent=2 < Routine=3.
    pub fn rank(self) -> u8 {
        match self {
            TriageCategory::Emergency => 1,
            TriageCategory::Urgent => 2,
            TriageCategory::Routine => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriageCategory::Emergency => "Emergency",
            TriageCategory::Urgent => "Urgent",
            TriageCategory::Routine => "Routine",
        }
    }
}

impl fmt::Display for TriageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "emergency" => Ok(TriageCategory::Emergency),
            "urgent" => Ok(TriageCategory::Urgent),
            "routine" => Ok(TriageCategory::Routine),
            other => Err(format!("unknown triage category: {}", other)),
        }
    }
}

/// Output of a classifier backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: TriageCategory,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

/// Structured, patient-facing explanation of a triage result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationDetails {
    pub explanation: String,
    /// Absent when home care is not appropriate (e.g. emergencies)
    #[serde(default)]
    pub home_care_suggestions: Option<String>,
    pub when_to_worry: String,
    pub next_steps: String,
}

/// Demographic profile passed to the explainer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientProfile {
    pub age: u32,
    pub gender: String,
    pub bmi: f64,
    /// Sorted medical history
    pub history: Vec<String>,
}

/// A validated triage request, ready for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageRequest {
    pub symptoms: String,
    pub language: String,
    pub profile: PatientProfile,
}

impl TriageRequest {
    pub fn new(
        symptoms: impl Into<String>,
        language: impl Into<String>,
        age: u32,
        gender: impl Into<String>,
        bmi: f64,
        history: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut history: Vec<String> = history.into_iter().collect();
        history.sort();
        Self {
            symptoms: symptoms.into(),
            language: language.into(),
            profile: PatientProfile { age, gender: gender.into(), bmi: round_to(bmi, 1), history },
        }
    }

    /// First characters of the symptom text, for log lines.
    pub fn symptoms_preview(&self) -> String {
        self.symptoms.chars().take(30).collect()
    }
}

/// The cached, immutable composite result of one triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResponse {
    pub triage_category: TriageCategory,
    pub confidence: f32,
    pub keywords: BTreeSet<String>,
    pub explanation_details: ExplanationDetails,
}

/// Reasons a `POST /triage` body is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields (symptoms, age, gender, height, weight).")]
    MissingFields,

    #[error("Invalid age: expected a non-negative whole number.")]
    InvalidAge,
}

/// Raw JSON body of `POST /triage`.
///
/// Every field is optional at the serde level so that missing fields can be
/// reported as a 400 with our own error payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriageBody {
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub history: Option<Vec<String>>,
    #[serde(default)]
    pub language: Option<String>,
    /// When present, the result is pushed into the priority scheduler
    #[serde(default)]
    pub patient_id: Option<String>,
}

impl TriageBody {
    /// Validate the body and build a pipeline request.
    pub fn validate(&self) -> Result<TriageRequest, ValidationError> {
        let symptoms = self.symptoms.as_deref().map(str::trim).unwrap_or_default();
        let gender = self.gender.as_deref().map(str::trim).unwrap_or_default();

        if symptoms.is_empty()
            || gender.is_empty()
            || is_missing(&self.age)
            || is_missing(&self.height)
            || is_missing(&self.weight)
        {
            return Err(ValidationError::MissingFields);
        }

        let age = self
            .age
            .as_ref()
            .and_then(parse_age)
            .ok_or(ValidationError::InvalidAge)?;

        let bmi = match (
            self.height.as_ref().and_then(as_number),
            self.weight.as_ref().and_then(as_number),
        ) {
            (Some(height_cm), Some(weight_kg)) => compute_bmi(height_cm, weight_kg),
            _ => 0.0,
        };

        let language = self
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("en");

        Ok(TriageRequest::new(
            symptoms,
            language,
            age,
            gender,
            bmi,
            self.history.clone().unwrap_or_default(),
        ))
    }
}

/// BMI from height in centimetres and weight in kilograms, rounded to one decimal.
///
/// Zero, negative or non-finite inputs give 0.0.
pub fn compute_bmi(height_cm: f64, weight_kg: f64) -> f64 {
    if height_cm <= 0.0 || weight_kg <= 0.0 {
        return 0.0;
    }
    let height_m = height_cm / 100.0;
    let bmi = weight_kg / (height_m * height_m);
    if bmi.is_finite() {
        round_to(bmi, 1)
    } else {
        0.0
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn is_missing(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn parse_age(value: &Value) -> Option<u32> {
    let age = as_number(value)?;
    if age < 0.0 || age.fract() != 0.0 || age > u32::MAX as f64 {
        return None;
    }
    Some(age as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> TriageBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_category_rank_order() {
        assert!(TriageCategory::Emergency.rank() < TriageCategory::Urgent.rank());
        assert!(TriageCategory::Urgent.rank() < TriageCategory::Routine.rank());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("EMERGENCY".parse::<TriageCategory>(), Ok(TriageCategory::Emergency));
        assert_eq!(" routine ".parse::<TriageCategory>(), Ok(TriageCategory::Routine));
        assert!("critical".parse::<TriageCategory>().is_err());
    }

    #[test]
    fn test_category_serializes_as_name() {
        let json = serde_json::to_string(&TriageCategory::Urgent).unwrap();
        assert_eq!(json, "\"Urgent\"");
    }

    #[test]
    fn test_compute_bmi() {
        assert_eq!(compute_bmi(175.0, 80.0), 26.1);
        assert_eq!(compute_bmi(0.0, 80.0), 0.0);
        assert_eq!(compute_bmi(175.0, 0.0), 0.0);
    }

    #[test]
    fn test_validate_full_body() {
        let request = body(json!({
            "symptoms": "  severe chest pain  ",
            "age": 45,
            "gender": "male",
            "height": 175,
            "weight": 80,
            "history": ["hypertension", "asthma"]
        }))
        .validate()
        .unwrap();

        assert_eq!(request.symptoms, "severe chest pain");
        assert_eq!(request.language, "en");
        assert_eq!(request.profile.age, 45);
        assert_eq!(request.profile.bmi, 26.1);
        assert_eq!(request.profile.history, vec!["asthma", "hypertension"]);
    }

    #[test]
    fn test_validate_accepts_numeric_strings() {
        let request = body(json!({
            "symptoms": "cough",
            "age": "30",
            "gender": "female",
            "height": "160",
            "weight": "55.5",
            "language": "hi"
        }))
        .validate()
        .unwrap();

        assert_eq!(request.profile.age, 30);
        assert_eq!(request.profile.bmi, 21.7);
        assert_eq!(request.language, "hi");
    }

    #[test]
    fn test_validate_missing_fields() {
        let err = body(json!({"symptoms": "cough", "age": 30})).validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingFields);
        assert!(err.to_string().contains("Missing required fields"));

        let err = body(json!({
            "symptoms": "   ",
            "age": 30,
            "gender": "f",
            "height": 160,
            "weight": 50
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingFields);
    }

    #[test]
    fn test_validate_malformed_age() {
        let err = body(json!({
            "symptoms": "cough",
            "age": "thirty",
            "gender": "f",
            "height": 160,
            "weight": 50
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err, ValidationError::InvalidAge);
    }

    #[test]
    fn test_invalid_height_defaults_bmi_to_zero() {
        let request = body(json!({
            "symptoms": "cough",
            "age": 30,
            "gender": "f",
            "height": 0,
            "weight": 50
        }))
        .validate()
        .unwrap();
        assert_eq!(request.profile.bmi, 0.0);

        let request = body(json!({
            "symptoms": "cough",
            "age": 30,
            "gender": "f",
            "height": "tall",
            "weight": 50
        }))
        .validate()
        .unwrap();
        assert_eq!(request.profile.bmi, 0.0);
    }

    #[test]
    fn test_symptoms_preview_truncates() {
        let request = TriageRequest::new("a".repeat(100), "en", 1, "m", 0.0, Vec::new());
        assert_eq!(request.symptoms_preview().len(), 30);
    }
}
