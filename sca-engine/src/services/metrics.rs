//! Metrics collection for the authorization engine.
//!
//! Counters are registered once and the record helpers no-op until
//! `init_metrics` has run, so the engine works unchanged in processes
//! that never scrape metrics.

use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static SCA_CHALLENGES_SENT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SCA_VALIDATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SCA_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize metrics collection. Safe to call more than once.
pub fn init_metrics() {
    if PROMETHEUS_REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let challenges_counter = IntCounterVec::new(
        Opts::new(
            "sca_challenges_sent_total",
            "Total challenge dispatches by channel and status",
        ),
        &["channel", "status"],
    )
    .expect("Failed to create sca_challenges_sent_total metric");

    let validations_counter = IntCounterVec::new(
        Opts::new(
            "sca_validations_total",
            "Total code validations by result",
        ),
        &["result"],
    )
    .expect("Failed to create sca_validations_total metric");

    let operations_counter = IntCounterVec::new(
        Opts::new(
            "sca_operations_total",
            "Total operation verdicts by kind and outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("Failed to create sca_operations_total metric");

    registry
        .register(Box::new(challenges_counter.clone()))
        .expect("Failed to register sca_challenges_sent_total");
    registry
        .register(Box::new(validations_counter.clone()))
        .expect("Failed to register sca_validations_total");
    registry
        .register(Box::new(operations_counter.clone()))
        .expect("Failed to register sca_operations_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    SCA_CHALLENGES_SENT_TOTAL
        .set(challenges_counter)
        .expect("Failed to set sca_challenges_sent_total");
    SCA_VALIDATIONS_TOTAL
        .set(validations_counter)
        .expect("Failed to set sca_validations_total");
    SCA_OPERATIONS_TOTAL
        .set(operations_counter)
        .expect("Failed to set sca_operations_total");
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let Some(registry) = PROMETHEUS_REGISTRY.get() else {
        return "# Metrics not initialized\n".to_string();
    };

    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a challenge dispatch.
pub fn record_challenge_sent(channel: &str, status: &str) {
    if let Some(counter) = SCA_CHALLENGES_SENT_TOTAL.get() {
        counter.with_label_values(&[channel, status]).inc();
    }
}

/// Record a code validation result.
pub fn record_validation(result: &str) {
    if let Some(counter) = SCA_VALIDATIONS_TOTAL.get() {
        counter.with_label_values(&[result]).inc();
    }
}

/// Record an operation verdict.
pub fn record_operation_outcome(kind: &str, outcome: &str) {
    if let Some(counter) = SCA_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[kind, outcome]).inc();
    }
}
