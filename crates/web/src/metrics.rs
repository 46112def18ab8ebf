use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

struct WebMetrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    record_not_found_total: IntCounterVec,
    paste_saves_total: IntCounterVec,
    lease_releases_total: IntCounter,
}

static METRICS: OnceLock<WebMetrics> = OnceLock::new();

impl WebMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("berth_web_http_requests_total", "HTTP request count."),
            &["route", "method", "status"],
        )
        .expect("create berth_web_http_requests_total");
        let _ = registry.register(Box::new(http_requests_total.clone()));

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "berth_web_http_request_duration_seconds",
                "HTTP request duration in seconds.",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["route", "method", "outcome"],
        )
        .expect("create berth_web_http_request_duration_seconds");
        let _ = registry.register(Box::new(http_request_duration_seconds.clone()));

        let record_not_found_total = IntCounterVec::new(
            Opts::new(
                "berth_web_record_not_found_total",
                "Merged not-found outcomes (missing record or denied capability).",
            ),
            &["app"],
        )
        .expect("create berth_web_record_not_found_total");
        let _ = registry.register(Box::new(record_not_found_total.clone()));

        let paste_saves_total = IntCounterVec::new(
            Opts::new("berth_web_paste_saves_total", "Successful paste saves."),
            &["mode"],
        )
        .expect("create berth_web_paste_saves_total");
        let _ = registry.register(Box::new(paste_saves_total.clone()));

        let lease_releases_total = IntCounter::new(
            "berth_web_lease_releases_total",
            "Successful lease releases.",
        )
        .expect("create berth_web_lease_releases_total");
        let _ = registry.register(Box::new(lease_releases_total.clone()));

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            record_not_found_total,
            paste_saves_total,
            lease_releases_total,
        }
    }
}

fn metrics() -> &'static WebMetrics {
    METRICS.get_or_init(WebMetrics::new)
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    metrics()
        .http_requests_total
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    metrics()
        .http_request_duration_seconds
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn inc_record_not_found(app: &str) {
    metrics()
        .record_not_found_total
        .with_label_values(&[app])
        .inc();
}

pub fn inc_paste_save(mode: &str) {
    metrics().paste_saves_total.with_label_values(&[mode]).inc();
}

pub fn inc_lease_release() {
    metrics().lease_releases_total.inc();
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = metrics().registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
