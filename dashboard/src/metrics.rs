use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref POLL_CYCLES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_poll_cycles_total",
        "Total poll cycles started"
    ))
    .unwrap();
    pub static ref FETCH_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_fetch_failures_total",
        "Total sensor store reads that failed"
    ))
    .unwrap();
    pub static ref INVALID_READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_invalid_readings_total",
        "Total readings dropped as malformed or implausible"
    ))
    .unwrap();
    pub static ref STALE_WRITES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_stale_writes_suppressed_total",
        "Total fetch results discarded because the poller was shut down"
    ))
    .unwrap();
    pub static ref CHAT_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_chat_failures_total",
        "Total chat backend calls answered with a fallback message"
    ))
    .unwrap();
    pub static ref FETCH_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dashboard_fetch_latency_seconds",
            "Time taken to read current and history from the sensor store"
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    )
    .unwrap();
    pub static ref READINGS_IN_STORE: Gauge = Gauge::with_opts(Opts::new(
        "dashboard_readings_in_store",
        "Readings held by the store after the last replace"
    ))
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(POLL_CYCLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FETCH_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_READINGS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STALE_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CHAT_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FETCH_LATENCY_SECONDS.clone()))?;
    REGISTRY.register(Box::new(READINGS_IN_STORE.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
