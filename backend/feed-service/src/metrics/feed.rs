use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// Feed entry inserts during fan-out, by outcome (delivered/failed).
    pub static ref FEED_FANOUT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_fanout_total",
        "Feed entry inserts attempted during fan-out segmented by outcome",
        &["result"]
    )
    .expect("failed to register feed_fanout_total");

    /// Presigned upload URL requests, by outcome (ok/error).
    pub static ref FEED_PRESIGN_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_presign_total",
        "Presigned upload URL requests segmented by outcome",
        &["result"]
    )
    .expect("failed to register feed_presign_total");

    /// Feed items removed or degraded during enrichment, by feed and policy outcome.
    pub static ref FEED_ENRICHMENT_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_enrichment_failures_total",
        "Feed items that failed enrichment segmented by feed and outcome",
        &["feed", "outcome"]
    )
    .expect("failed to register feed_enrichment_failures_total");

    /// Feed read latency by feed kind (home/trending).
    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_request_duration_seconds",
        "Feed read duration segmented by feed kind",
        &["feed"]
    )
    .expect("failed to register feed_request_duration_seconds");
}
