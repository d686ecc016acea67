//! Metrics collection for rounds

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};

lazy_static! {
    /// Counter for resolved rounds
    pub static ref ROUNDS_RESOLVED: CounterVec = register_counter_vec!(
        "agentbft_rounds_resolved_total",
        "Total number of resolved round instances",
        &["round", "event"]
    ).expect("rounds metric registers once");

    /// Counter for payloads
    pub static ref PAYLOADS: CounterVec = register_counter_vec!(
        "agentbft_payloads_total",
        "Total number of payloads delivered to rounds",
        &["round", "result"]
    ).expect("payloads metric registers once");

    /// Counter for transitions
    pub static ref TRANSITIONS: CounterVec = register_counter_vec!(
        "agentbft_transitions_total",
        "Total number of transitions taken",
        &["from", "to"]
    ).expect("transitions metric registers once");

    /// Gauge for collected payloads in the active round
    pub static ref COLLECTION_SIZE: GaugeVec = register_gauge_vec!(
        "agentbft_collection_size",
        "Payloads collected by the active round",
        &["round"]
    ).expect("collection metric registers once");
}

/// Record a payload
pub fn record_payload(round: &str, accepted: bool) {
    let label = if accepted { "accepted" } else { "rejected" };
    PAYLOADS.with_label_values(&[round, label]).inc();
}

/// Record the event a round resolved with
pub fn record_resolution(round: &str, event: &str) {
    ROUNDS_RESOLVED.with_label_values(&[round, event]).inc();
}

/// Record a transition
pub fn record_transition(from: &str, to: &str) {
    TRANSITIONS.with_label_values(&[from, to]).inc();
}

/// Update collection size
pub fn update_collection_size(round: &str, size: usize) {
    COLLECTION_SIZE.with_label_values(&[round]).set(size as f64);
}
