use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "xcloud_remap_messages_total",
        "Runtime messages handled, by message type",
        &["type"]
    )
    .expect("register messages_total")
});

pub static COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "xcloud_remap_commands_total",
        "Keyboard commands handled, by command",
        &["command"]
    )
    .expect("register commands_total")
});

pub static STORAGE_FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "xcloud_remap_storage_fallbacks_total",
        "Storage operations retried against the local tier",
        &["op"]
    )
    .expect("register storage_fallbacks_total")
});

pub static STORAGE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "xcloud_remap_storage_failures_total",
        "Storage operations that failed on both tiers",
        &["op"]
    )
    .expect("register storage_failures_total")
});

pub static ANALYTICS_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "xcloud_remap_analytics_failures_total",
        "Analytics events that could not be delivered"
    )
    .expect("register analytics_failures_total")
});

pub static PAYMENT_FETCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "xcloud_remap_payment_fetch_total",
        "Payment provider fetches, by outcome",
        &["outcome"]
    )
    .expect("register payment_fetch_total")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        COMMANDS_TOTAL.with_label_values(&["toggle-on-off"]).inc();
        let (status, body) = encode_metrics();
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.contains("xcloud_remap_commands_total"));
    }
}
