//! Rule-based symptom classifier.
//!
//! Matches red-flag phrases against the lowercased symptom text. The most
//! urgent tier with at least one match wins; more matches raise confidence.

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::{Classifier, ClassifierError};
use crate::types::{Classification, TriageCategory};

const EMERGENCY_PATTERNS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "shortness of breath",
    "can't breathe",
    "cannot breathe",
    "not breathing",
    "unconscious",
    "unresponsive",
    "seizure",
    "severe bleeding",
    "coughing up blood",
    "vomiting blood",
    "stroke",
    "slurred speech",
    "face drooping",
    "paralysis",
    "suicidal",
    "overdose",
    "anaphylaxis",
    "throat swelling",
    "heart attack",
];

const URGENT_PATTERNS: &[&str] = &[
    "high fever",
    "fever",
    "vomiting",
    "diarrhea",
    "dehydration",
    "severe pain",
    "abdominal pain",
    "broken",
    "fracture",
    "burn",
    "deep cut",
    "infection",
    "blurred vision",
    "dizziness",
    "fainting",
    "migraine",
    "blood in urine",
    "persistent",
];

const ROUTINE_PATTERNS: &[&str] = &[
    "cough",
    "runny nose",
    "sore throat",
    "sneezing",
    "congestion",
    "headache",
    "rash",
    "itching",
    "fatigue",
    "tired",
    "mild",
    "back pain",
    "constipation",
];

/// Keyword classifier with fixed pattern tiers
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify synchronously.
    pub fn classify_text(&self, symptoms: &str) -> Classification {
        let lower = symptoms.to_lowercase();
        let matches = |patterns: &[&str]| -> BTreeSet<String> {
            patterns
                .iter()
                .filter(|p| lower.contains(*p))
                .map(|p| p.to_string())
                .collect()
        };

        let emergency = matches(EMERGENCY_PATTERNS);
        if !emergency.is_empty() {
            let confidence = 0.80 + 0.05 * (emergency.len() - 1) as f32;
            return Classification {
                category: TriageCategory::Emergency,
                confidence: confidence.min(0.99),
                keywords: emergency,
            };
        }

        let urgent = matches(URGENT_PATTERNS);
        if !urgent.is_empty() {
            let confidence = 0.70 + 0.05 * (urgent.len() - 1) as f32;
            return Classification {
                category: TriageCategory::Urgent,
                confidence: confidence.min(0.95),
                keywords: urgent,
            };
        }

        let routine = matches(ROUTINE_PATTERNS);
        // No recognised phrase at all still means routine, with low confidence
        let confidence = if routine.is_empty() {
            0.50
        } else {
            (0.65 + 0.05 * (routine.len() - 1) as f32).min(0.90)
        };
        Classification { category: TriageCategory::Routine, confidence, keywords: routine }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, symptoms: &str) -> Result<Classification, ClassifierError> {
        Ok(self.classify_text(symptoms))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
