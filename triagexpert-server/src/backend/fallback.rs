//! Static explanations used when the explainer is unavailable.

use crate::types::{ExplanationDetails, TriageCategory};

/// Category-appropriate explanation that needs no backend.
pub fn fallback_explanation(category: TriageCategory) -> ExplanationDetails {
    match category {
        TriageCategory::Emergency => ExplanationDetails {
            explanation: "Based on the symptoms provided, immediate medical attention is \
                          recommended."
                .to_string(),
            home_care_suggestions: None,
            when_to_worry: "Do not wait for symptoms to change. Symptoms like these can get \
                            worse quickly."
                .to_string(),
            next_steps: "Go to the nearest emergency room or call your local emergency number \
                         now."
                .to_string(),
        },
        TriageCategory::Urgent => ExplanationDetails {
            explanation: "Your symptoms suggest that you should seek medical advice soon."
                .to_string(),
            home_care_suggestions: Some(
                "Rest, stay hydrated and keep track of how your symptoms change.".to_string(),
            ),
            when_to_worry: "Seek emergency care if symptoms become severe, you have trouble \
                            breathing, or you feel faint."
                .to_string(),
            next_steps: "Contact your doctor's office or an urgent care center within the next \
                         24 hours."
                .to_string(),
        },
        TriageCategory::Routine => ExplanationDetails {
            explanation: "These symptoms do not appear to require immediate attention."
                .to_string(),
            home_care_suggestions: Some(
                "Rest, drink plenty of fluids and use over-the-counter remedies as directed."
                    .to_string(),
            ),
            when_to_worry: "Contact a doctor if symptoms last more than a few days or get \
                            worse."
                .to_string(),
            next_steps: "Monitor your symptoms and schedule an appointment with your primary \
                         care physician."
                .to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emergency_has_no_home_care() {
        let details = fallback_explanation(TriageCategory::Emergency);
        assert!(details.home_care_suggestions.is_none());
        assert!(details.next_steps.contains("emergency"));
    }

    #[test]
    fn test_urgent_mentions_24_hours() {
        let details = fallback_explanation(TriageCategory::Urgent);
        assert!(details.next_steps.contains("24 hours"));
        assert!(details.home_care_suggestions.is_some());
    }

    #[test]
    fn test_routine_suggests_primary_care() {
        let details = fallback_explanation(TriageCategory::Routine);
        assert!(details.next_steps.contains("primary care"));
    }
}
