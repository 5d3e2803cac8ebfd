//! Prometheus metrics for the triage service
//!
//! Exposes metrics in Prometheus format for monitoring and observability.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry for triage metrics
    pub static ref REGISTRY: Registry = Registry::new();

    // ============== Request Metrics ==============

    /// Triage requests by resulting category and status
    pub static ref TRIAGE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("requests_total", "Total number of triage requests")
            .namespace("triagexpert"),
        &["category", "status"]
    ).expect("metric can be created");

    /// Request duration histogram by status
    pub static ref REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "request_duration_seconds",
            "Triage request duration in seconds"
        )
        .namespace("triagexpert")
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["status"]
    ).expect("metric can be created");

    /// Requests currently being handled
    pub static ref ACTIVE_REQUESTS: Gauge = Gauge::with_opts(
        Opts::new("active_requests", "Number of triage requests currently being processed")
            .namespace("triagexpert")
    ).expect("metric can be created");

    // ============== Cache Metrics ==============

    pub static ref CACHE_HITS_TOTAL: Counter = Counter::with_opts(
        Opts::new("cache_hits_total", "Total cache hits")
            .namespace("triagexpert")
    ).expect("metric can be created");

    pub static ref CACHE_MISSES_TOTAL: Counter = Counter::with_opts(
        Opts::new("cache_misses_total", "Total cache misses")
            .namespace("triagexpert")
    ).expect("metric can be created");

    /// Requests that waited on an identical in-flight request
    pub static ref COALESCED_REQUESTS_TOTAL: Counter = Counter::with_opts(
        Opts::new("coalesced_requests_total", "Total requests served by an in-flight computation")
            .namespace("triagexpert")
    ).expect("metric can be created");

    pub static ref CACHE_SIZE: Gauge = Gauge::with_opts(
        Opts::new("cache_size", "Current cache size (entries)")
            .namespace("triagexpert")
    ).expect("metric can be created");

    // ============== Backend Metrics ==============

    /// Classifier and explainer calls by backend and outcome
    pub static ref BACKEND_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("backend_calls_total", "Total backend calls")
            .namespace("triagexpert"),
        &["backend", "status"]
    ).expect("metric can be created");

    /// Fallback explanations served, by category
    pub static ref EXPLANATION_FALLBACKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("explanation_fallbacks_total", "Total fallback explanations served")
            .namespace("triagexpert"),
        &["category"]
    ).expect("metric can be created");

    // ============== Scheduler Metrics ==============

    pub static ref QUEUE_SIZE: Gauge = Gauge::with_opts(
        Opts::new("queue_size", "Current number of patients in the priority queue")
            .namespace("triagexpert")
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
/// Should be called once at startup.
pub fn register_metrics() -> prometheus::Result<()> {
    // Request metrics
    REGISTRY.register(Box::new(TRIAGE_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_REQUESTS.clone()))?;

    // Cache metrics
    REGISTRY.register(Box::new(CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(COALESCED_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_SIZE.clone()))?;

    // Backend metrics
    REGISTRY.register(Box::new(BACKEND_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXPLANATION_FALLBACKS_TOTAL.clone()))?;

    // Scheduler metrics
    REGISTRY.register(Box::new(QUEUE_SIZE.clone()))?;

    Ok(())
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# Error encoding metrics: {}", e))
}

/// Helper struct for tracking triage request duration.
/// Counts as an error if dropped without an explicit record.
pub struct RequestTimer {
    start: std::time::Instant,
}

impl RequestTimer {
    pub fn new() -> Self {
        ACTIVE_REQUESTS.inc();
        Self { start: std::time::Instant::now() }
    }

    /// Record a successful triage with its category.
    pub fn record_success(self, category: &str) {
        self.finish(category, "success");
    }

    /// Record a failed triage.
    pub fn record_failure(self, status: &str) {
        self.finish("none", status);
    }

    fn finish(self, category: &str, status: &str) {
        let duration = self.start.elapsed().as_secs_f64();
        REQUEST_DURATION_SECONDS
            .with_label_values(&[status])
            .observe(duration);
        TRIAGE_REQUESTS_TOTAL
            .with_label_values(&[category, status])
            .inc();

        ACTIVE_REQUESTS.dec();
        // Prevent the Drop impl from running
        std::mem::forget(self);
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        ACTIVE_REQUESTS.dec();
        TRIAGE_REQUESTS_TOTAL
            .with_label_values(&["none", "error"])
            .inc();
    }
}

/// Record a cache lookup made by the pipeline.
pub fn record_cache_lookup(hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.inc();
    } else {
        CACHE_MISSES_TOTAL.inc();
    }
}

/// Record a request that joined an in-flight computation.
pub fn record_coalesced() {
    COALESCED_REQUESTS_TOTAL.inc();
}

/// Update cache size gauge.
pub fn set_cache_size(size: usize) {
    CACHE_SIZE.set(size as f64);
}

/// Record a classifier or explainer call.
pub fn record_backend_call(backend: &str, status: &str) {
    BACKEND_CALLS_TOTAL.with_label_values(&[backend, status]).inc();
}

/// Record a fallback explanation.
pub fn record_explanation_fallback(category: &str) {
    EXPLANATION_FALLBACKS_TOTAL.with_label_values(&[category]).inc();
}

/// Update queue size gauge.
pub fn set_queue_size(size: usize) {
    QUEUE_SIZE.set(size as f64);
}
