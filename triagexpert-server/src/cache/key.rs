//! Cache key derivation for triage requests.

use std::fmt;

use xxhash_rust::xxh3::xxh3_64;

use crate::types::TriageRequest;

/// Canonical fingerprint of every input that affects a triage result.
///
/// Equality and hashing cover all fields, so two keys are equal exactly when
/// the normalized requests are equal. History is stored sorted and BMI is
/// stored as tenths, which makes the key independent of history order and of
/// float noise below one decimal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    symptoms: String,
    language: String,
    age: u32,
    gender: String,
    bmi_tenths: i64,
    history: Vec<String>,
}

impl CacheKey {
    /// Derive a key from the raw request fields.
    ///
    /// Symptom text is matched exactly: no trimming, case folding or other
    /// semantic normalization happens here.
    pub fn derive<I, S>(
        symptoms: &str,
        language: &str,
        age: u32,
        gender: &str,
        bmi: f64,
        history: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut history: Vec<String> = history.into_iter().map(Into::into).collect();
        history.sort();

        Self {
            symptoms: symptoms.to_string(),
            language: language.to_string(),
            age,
            gender: gender.to_string(),
            bmi_tenths: (bmi * 10.0).round() as i64,
            history,
        }
    }

    /// Derive a key from a validated request.
    pub fn for_request(request: &TriageRequest) -> Self {
        Self::derive(
            &request.symptoms,
            &request.language,
            request.profile.age,
            &request.profile.gender,
            request.profile.bmi,
            request.profile.history.iter().cloned(),
        )
    }

    /// 64-bit xxh3 digest of the canonical form, for logs and metrics.
    ///
    /// Never used for lookups: distinct keys may share a fingerprint.
    pub fn fingerprint(&self) -> u64 {
        xxh3_64(self.canonical().as_bytes())
    }

    /// Length-prefixed canonical encoding, so no field boundary is ambiguous.
    fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.symptoms.len() + 64);
        push_field(&mut out, &self.symptoms);
        push_field(&mut out, &self.language);
        push_field(&mut out, &self.age.to_string());
        push_field(&mut out, &self.gender);
        push_field(&mut out, &self.bmi_tenths.to_string());
        out.push_str(&format!("{}#", self.history.len()));
        for item in &self.history {
            push_field(&mut out, item);
        }
        out
    }
}

fn push_field(out: &mut String, value: &str) {
    out.push_str(&value.len().to_string());
    out.push(':');
    out.push_str(value);
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({:016x})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CacheKey {
        CacheKey::derive("chest pain", "en", 45, "male", 26.1, ["asthma", "diabetes"])
    }

    #[test]
    fn test_history_order_does_not_matter() {
        let reversed = CacheKey::derive("chest pain", "en", 45, "male", 26.1, ["diabetes", "asthma"]);
        assert_eq!(base(), reversed);
        assert_eq!(base().fingerprint(), reversed.fingerprint());
    }

    #[test]
    fn test_every_field_changes_key() {
        let variants = [
            CacheKey::derive("chest pains", "en", 45, "male", 26.1, ["asthma", "diabetes"]),
            CacheKey::derive("chest pain", "hi", 45, "male", 26.1, ["asthma", "diabetes"]),
            CacheKey::derive("chest pain", "en", 46, "male", 26.1, ["asthma", "diabetes"]),
            CacheKey::derive("chest pain", "en", 45, "female", 26.1, ["asthma", "diabetes"]),
            CacheKey::derive("chest pain", "en", 45, "male", 26.2, ["asthma", "diabetes"]),
            CacheKey::derive("chest pain", "en", 45, "male", 26.1, ["asthma"]),
        ];

        for variant in &variants {
            assert_ne!(&base(), variant);
        }
    }

    #[test]
    fn test_bmi_rounded_to_one_decimal() {
        let a = CacheKey::derive("cough", "en", 30, "f", 21.68, Vec::<String>::new());
        let b = CacheKey::derive("cough", "en", 30, "f", 21.7, Vec::<String>::new());
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = CacheKey::derive("ab", "c", 1, "m", 0.0, Vec::<String>::new());
        let b = CacheKey::derive("a", "bc", 1, "m", 0.0, Vec::<String>::new());
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_for_request_matches_derive() {
        let request = TriageRequest::new(
            "chest pain",
            "en",
            45,
            "male",
            26.1,
            vec!["diabetes".to_string(), "asthma".to_string()],
        );
        assert_eq!(CacheKey::for_request(&request), base());
    }
}
