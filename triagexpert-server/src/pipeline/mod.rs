//! Memoized classify → explain pipeline.
//!
//! [`TriagePipeline::invoke`] answers a request from the cache when it can.
//! On a miss it runs the classifier and then the explainer, stores the
//! composite result and returns it. Concurrent misses for the same key are
//! collapsed onto a single execution:
//!
//! ```text
//!  caller A ──miss──► registers in-flight marker ──► classify ─► explain ─► set ─► publish
//!  caller B ──miss──► finds marker ───────────────── waits ────────────────────────► result
//! ```
//!
//! Classification is load-bearing: its failure or timeout fails the request
//! and nothing is cached. Explanation is best effort: on failure or timeout
//! the static fallback for the category is used and the result is cached.

mod config;

pub use config::PipelineConfig;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::backend::{fallback_explanation, Classifier, Explainer};
use crate::cache::{CacheConfig, CacheKey, CacheStats, CacheStore};
use crate::metrics;
use crate::types::{Classification, ExplanationDetails, TriageRequest, TriageResponse};

/// Failure of the load-bearing part of the pipeline.
///
/// Cloneable so that one failure can be handed to every waiting caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Classification timed out after {0:?}")]
    ClassificationTimeout(Duration),
}

type FlightResult = Result<TriageResponse, PipelineError>;
type FlightMap = Mutex<HashMap<CacheKey, watch::Receiver<Option<FlightResult>>>>;

enum Flight {
    Leader(watch::Sender<Option<FlightResult>>),
    Follower(watch::Receiver<Option<FlightResult>>),
}

/// Removes the in-flight marker when the leader finishes or is cancelled.
struct FlightGuard<'a> {
    in_flight: &'a FlightMap,
    key: &'a CacheKey,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(self.key);
    }
}

/// Cache-fronted triage pipeline with single-flight execution per key
pub struct TriagePipeline {
    classifier: Arc<dyn Classifier>,
    explainer: Arc<dyn Explainer>,
    cache: CacheStore,
    cache_ttl: Duration,
    config: PipelineConfig,
    in_flight: FlightMap,
}

impl TriagePipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        explainer: Arc<dyn Explainer>,
        cache_config: &CacheConfig,
        config: PipelineConfig,
    ) -> Self {
        info!(
            classifier = classifier.name(),
            explainer = explainer.name(),
            cache_capacity = cache_config.capacity,
            cache_ttl_secs = cache_config.ttl.as_secs(),
            "Creating triage pipeline"
        );

        Self {
            classifier,
            explainer,
            cache: CacheStore::new(cache_config.capacity),
            cache_ttl: cache_config.ttl,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Triage a request, serving identical requests from memory.
    pub async fn invoke(&self, request: &TriageRequest) -> Result<TriageResponse, PipelineError> {
        let key = CacheKey::for_request(request);

        loop {
            if let Some(cached) = self.cache.get(&key).await {
                metrics::record_cache_lookup(true);
                debug!(key = ?key, "Cache hit");
                return Ok(cached);
            }
            metrics::record_cache_lookup(false);

            let flight = {
                let mut in_flight = self.in_flight.lock();
                match in_flight.get(&key) {
                    Some(rx) => Flight::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        in_flight.insert(key.clone(), rx);
                        Flight::Leader(tx)
                    }
                }
            };

            match flight {
                Flight::Leader(tx) => {
                    let _guard = FlightGuard { in_flight: &self.in_flight, key: &key };

                    // A previous leader may have stored the result between our
                    // lookup and taking the marker.
                    if let Some(cached) = self.cache.peek(&key).await {
                        let _ = tx.send(Some(Ok(cached.clone())));
                        return Ok(cached);
                    }

                    info!(
                        key = ?key,
                        age = request.profile.age,
                        history = request.profile.history.len(),
                        symptoms = %request.symptoms_preview(),
                        "Cache miss, running triage pipeline"
                    );

                    let result = self.run(request).await;
                    if let Ok(ref response) = result {
                        self.cache.set(key.clone(), response.clone(), self.cache_ttl).await;
                        metrics::set_cache_size(self.cache.len().await);
                    }
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
                Flight::Follower(mut rx) => {
                    self.cache.metrics().record_coalesced();
                    metrics::record_coalesced();
                    debug!(key = ?key, "Waiting for in-flight triage");

                    let outcome = rx.wait_for(Option::is_some).await.ok().and_then(|v| (*v).clone());
                    match outcome {
                        Some(result) => return result,
                        // Leader was cancelled before publishing; try again
                        None => continue,
                    }
                }
            }
        }
    }

    /// Classify then explain, without touching the cache.
    async fn run(&self, request: &TriageRequest) -> FlightResult {
        let classification = self.classify(request).await?;
        let explanation_details = self.explain(request, &classification).await;

        Ok(TriageResponse {
            triage_category: classification.category,
            confidence: round_confidence(classification.confidence),
            keywords: classification.keywords,
            explanation_details,
        })
    }

    async fn classify(&self, request: &TriageRequest) -> Result<Classification, PipelineError> {
        let backend = self.classifier.name();

        match timeout(self.config.classify_timeout, self.classifier.classify(&request.symptoms))
            .await
        {
            Ok(Ok(classification)) => {
                metrics::record_backend_call(backend, "success");
                debug!(
                    category = %classification.category,
                    confidence = classification.confidence,
                    "Symptoms classified"
                );
                Ok(classification)
            }
            Ok(Err(e)) => {
                metrics::record_backend_call(backend, "error");
                error!(backend, error = %e, "Classification failed");
                Err(PipelineError::Classification(e.to_string()))
            }
            Err(_) => {
                metrics::record_backend_call(backend, "timeout");
                error!(
                    backend,
                    timeout_ms = self.config.classify_timeout.as_millis() as u64,
                    "Classification timed out"
                );
                Err(PipelineError::ClassificationTimeout(self.config.classify_timeout))
            }
        }
    }

    async fn explain(
        &self,
        request: &TriageRequest,
        classification: &Classification,
    ) -> ExplanationDetails {
        let backend = self.explainer.name();
        let category = classification.category;

        match timeout(self.config.explain_timeout, self.explainer.explain(request, classification))
            .await
        {
            Ok(Ok(details)) => {
                metrics::record_backend_call(backend, "success");
                details
            }
            Ok(Err(e)) => {
                metrics::record_backend_call(backend, "error");
                metrics::record_explanation_fallback(category.as_str());
                warn!(backend, error = %e, %category, "Explanation failed, using fallback");
                fallback_explanation(category)
            }
            Err(_) => {
                metrics::record_backend_call(backend, "timeout");
                metrics::record_explanation_fallback(category.as_str());
                warn!(
                    backend,
                    timeout_ms = self.config.explain_timeout.as_millis() as u64,
                    %category,
                    "Explanation timed out, using fallback"
                );
                fallback_explanation(category)
            }
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Number of keys currently being computed
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn explainer_name(&self) -> &'static str {
        self.explainer.name()
    }
}

fn round_confidence(confidence: f32) -> f32 {
    ((confidence.clamp(0.0, 1.0) * 100.0).round()) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ClassifierError, ExplainerError};
    use crate::types::TriageCategory;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClassifier {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl StubClassifier {
        fn new(delay: Duration) -> Self {
            Self { calls: AtomicUsize::new(0), delay, fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: true }
        }
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, symptoms: &str) -> Result<Classification, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ClassifierError::Unavailable("model not loaded".to_string()));
            }
            let category = if symptoms.contains("chest") {
                TriageCategory::Emergency
            } else {
                TriageCategory::Routine
            };
            Ok(Classification {
                category,
                confidence: 0.876,
                keywords: BTreeSet::from(["stub".to_string()]),
            })
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    struct StubExplainer {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl StubExplainer {
        fn new(delay: Duration) -> Self {
            Self { calls: AtomicUsize::new(0), delay, fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: true }
        }
    }

    #[async_trait]
    impl Explainer for StubExplainer {
        async fn explain(
            &self,
            _request: &TriageRequest,
            classification: &Classification,
        ) -> Result<ExplanationDetails, ExplainerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ExplainerError::InvalidResponse("quota exceeded".to_string()));
            }
            Ok(ExplanationDetails {
                explanation: format!("generated for {}", classification.category),
                home_care_suggestions: None,
                when_to_worry: "soon".to_string(),
                next_steps: "act".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn pipeline(
        classifier: Arc<StubClassifier>,
        explainer: Arc<StubExplainer>,
        config: PipelineConfig,
    ) -> TriagePipeline {
        TriagePipeline::new(classifier, explainer, &CacheConfig::default(), config)
    }

    fn request(symptoms: &str) -> TriageRequest {
        TriageRequest::new(symptoms, "en", 45, "male", 26.1, vec!["asthma".to_string()])
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let classifier = Arc::new(StubClassifier::new(Duration::ZERO));
        let explainer = Arc::new(StubExplainer::new(Duration::ZERO));
        let pipeline = pipeline(classifier.clone(), explainer.clone(), PipelineConfig::default());

        let first = pipeline.invoke(&request("chest pain")).await.unwrap();
        let second = pipeline.invoke(&request("chest pain")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.cache_stats().await.count, 1);
    }

    #[tokio::test]
    async fn test_one_miss_then_one_hit_counted_once_each() {
        let classifier = Arc::new(StubClassifier::new(Duration::ZERO));
        let explainer = Arc::new(StubExplainer::new(Duration::ZERO));
        let pipeline = pipeline(classifier, explainer, PipelineConfig::default());

        pipeline.invoke(&request("chest pain")).await.unwrap();
        pipeline.invoke(&request("chest pain")).await.unwrap();

        let stats = pipeline.cache_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_history_order_shares_entry() {
        let classifier = Arc::new(StubClassifier::new(Duration::ZERO));
        let explainer = Arc::new(StubExplainer::new(Duration::ZERO));
        let pipeline = pipeline(classifier.clone(), explainer, PipelineConfig::default());

        let a = TriageRequest::new("cough", "en", 30, "f", 21.7, vec!["a".into(), "b".into()]);
        let b = TriageRequest::new("cough", "en", 30, "f", 21.7, vec!["b".into(), "a".into()]);
        pipeline.invoke(&a).await.unwrap();
        pipeline.invoke(&b).await.unwrap();

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_requests_both_computed() {
        let classifier = Arc::new(StubClassifier::new(Duration::ZERO));
        let explainer = Arc::new(StubExplainer::new(Duration::ZERO));
        let pipeline = pipeline(classifier.clone(), explainer, PipelineConfig::default());

        let emergency = pipeline.invoke(&request("chest pain")).await.unwrap();
        let routine = pipeline.invoke(&request("cough")).await.unwrap();

        assert_eq!(emergency.triage_category, TriageCategory::Emergency);
        assert_eq!(routine.triage_category, TriageCategory::Routine);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_confidence_rounded() {
        let pipeline = pipeline(
            Arc::new(StubClassifier::new(Duration::ZERO)),
            Arc::new(StubExplainer::new(Duration::ZERO)),
            PipelineConfig::default(),
        );
        let response = pipeline.invoke(&request("cough")).await.unwrap();
        assert!((response.confidence - 0.88).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_classification_failure_is_not_cached() {
        let classifier = Arc::new(StubClassifier::failing());
        let explainer = Arc::new(StubExplainer::new(Duration::ZERO));
        let pipeline = pipeline(classifier.clone(), explainer.clone(), PipelineConfig::default());

        let err = pipeline.invoke(&request("chest pain")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Classification(_)));
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.cache_stats().await.count, 0);

        // A retry hits the backend again
        let _ = pipeline.invoke(&request("chest pain")).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_classification_timeout() {
        let config = PipelineConfig {
            classify_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let pipeline = pipeline(
            Arc::new(StubClassifier::new(Duration::from_millis(200))),
            Arc::new(StubExplainer::new(Duration::ZERO)),
            config,
        );

        let err = pipeline.invoke(&request("chest pain")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ClassificationTimeout(_)));
        assert_eq!(pipeline.cache_stats().await.count, 0);
    }

    #[tokio::test]
    async fn test_explanation_failure_uses_fallback() {
        let explainer = Arc::new(StubExplainer::failing());
        let pipeline = pipeline(
            Arc::new(StubClassifier::new(Duration::ZERO)),
            explainer.clone(),
            PipelineConfig::default(),
        );

        let response = pipeline.invoke(&request("chest pain")).await.unwrap();
        assert_eq!(response.triage_category, TriageCategory::Emergency);
        assert!(response.keywords.contains("stub"));
        assert_eq!(response.explanation_details, fallback_explanation(TriageCategory::Emergency));

        // The degraded composite is cached
        pipeline.invoke(&request("chest pain")).await.unwrap();
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explanation_timeout_uses_fallback() {
        let config = PipelineConfig {
            explain_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let pipeline = pipeline(
            Arc::new(StubClassifier::new(Duration::ZERO)),
            Arc::new(StubExplainer::new(Duration::from_millis(200))),
            config,
        );

        let response = pipeline.invoke(&request("cough")).await.unwrap();
        assert_eq!(response.explanation_details, fallback_explanation(TriageCategory::Routine));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_run_once() {
        let classifier = Arc::new(StubClassifier::new(Duration::from_millis(100)));
        let explainer = Arc::new(StubExplainer::new(Duration::from_millis(100)));
        let pipeline = Arc::new(pipeline(
            classifier.clone(),
            explainer.clone(),
            PipelineConfig::default(),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.invoke(&request("chest pain")).await })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &results[0]));
        assert_eq!(pipeline.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failure_shared_with_waiters() {
        let classifier = Arc::new(StubClassifier {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
            fail: true,
        });
        let pipeline = Arc::new(pipeline(
            classifier.clone(),
            Arc::new(StubExplainer::new(Duration::ZERO)),
            PipelineConfig::default(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.invoke(&request("chest pain")).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_err());
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_leader_hands_over() {
        let classifier = Arc::new(StubClassifier::new(Duration::from_millis(150)));
        let pipeline = Arc::new(pipeline(
            classifier.clone(),
            Arc::new(StubExplainer::new(Duration::ZERO)),
            PipelineConfig::default(),
        ));

        let leader = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.invoke(&request("chest pain")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.invoke(&request("chest pain")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let response = follower.await.unwrap().unwrap();
        assert_eq!(response.triage_category, TriageCategory::Emergency);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.in_flight(), 0);
    }
}
