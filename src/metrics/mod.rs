use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;


lazy_static! {
    pub static ref FETCH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("secret_watch_fetch_total", "Scheduled fetches by backend kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref FETCH_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("secret_watch_fetch_errors_total", "Failed scheduled fetches by backend kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("secret_watch_events_total", "Change events published by backend kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_DEPTH: IntGauge = IntGauge::new(
        "secret_watch_queue_depth",
        "Paths waiting in the due-time queue"
    )
    .expect("metric can not be created");

    pub static ref FETCH_LATENCY_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("secret_watch_fetch_latency_ms", "Fetch latency in ms")
            .buckets(exponential_buckets(1.0, 2.0, 14).expect("valid buckets")),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry);
        registry
    };
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(FETCH_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(FETCH_ERRORS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(EVENTS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(QUEUE_DEPTH.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(FETCH_LATENCY_MS.clone()))
        .expect("collector can be registered");
}

/// Renders every watch metric in the Prometheus text exposition format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
