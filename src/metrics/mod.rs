/// Prometheus metrics for the risk ranking pipeline.
///
/// All metrics live in a process-wide registry and are cheap atomic updates,
/// so they are recorded unconditionally; `init_metrics` only makes them
/// visible to `gather_metrics`.
///
/// # Example
/// ```no_run
/// use fleet_risk_ranker::metrics::{self, RECORDS_SKIPPED_TOTAL};
///
/// RECORDS_SKIPPED_TOTAL.with_label_values(&["MISSING_FEATURE"]).inc();
/// println!("{}", metrics::gather_metrics());
/// ```
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, GaugeVec, Histogram, HistogramOpts, Opts, Registry,
};

const NAMESPACE: &str = "fleet_risk_ranker";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Records that produced a prediction
    pub static ref RECORDS_SCORED_TOTAL: Counter = Counter::with_opts(
        Opts::new("records_scored_total", "Total number of vehicle records scored")
            .namespace(NAMESPACE)
    ).expect("Failed to create RECORDS_SCORED_TOTAL metric");

    /// Records dropped from a batch
    ///
    /// Labels: reason (error code)
    pub static ref RECORDS_SKIPPED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("records_skipped_total", "Total number of vehicle records skipped")
            .namespace(NAMESPACE),
        &["reason"]
    ).expect("Failed to create RECORDS_SKIPPED_TOTAL metric");

    /// Batches rejected because model and pipeline disagree on features
    pub static ref BATCHES_ABORTED_TOTAL: Counter = Counter::with_opts(
        Opts::new("batches_aborted_total", "Total number of ranking batches aborted")
            .namespace(NAMESPACE)
    ).expect("Failed to create BATCHES_ABORTED_TOTAL metric");

    /// Wall time of a ranking batch in seconds
    ///
    /// Buckets: 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
    pub static ref RANKING_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ranking_duration_seconds",
            "Ranking batch duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("Failed to create RANKING_DURATION_SECONDS metric");

    /// Artifact load attempts
    ///
    /// Labels: artifact (scaler, model), outcome (success, error)
    pub static ref ARTIFACT_LOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("artifact_loads_total", "Total number of model artifact loads")
            .namespace(NAMESPACE),
        &["artifact", "outcome"]
    ).expect("Failed to create ARTIFACT_LOADS_TOTAL metric");

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information").namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Initialize all metrics
///
/// Returns an error if any metric fails to register (typically only happens
/// if metrics are registered multiple times).
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(RECORDS_SCORED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RECORDS_SKIPPED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BATCHES_ABORTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RANKING_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ARTIFACT_LOADS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
