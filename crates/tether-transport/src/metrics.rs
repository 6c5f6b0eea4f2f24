//! Transport metrics.
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! application installs a recorder.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const MESSAGES_TOTAL: &str = "tether_messages_total";
    pub const MESSAGES_BYTES: &str = "tether_messages_bytes";
    pub const CLOSURES_TOTAL: &str = "tether_closures_total";
}

/// Describe the transport metrics to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::MESSAGES_TOTAL,
        "Total number of messages sent and received"
    );
    metrics::describe_counter!(
        names::MESSAGES_BYTES,
        "Total payload bytes sent and received"
    );
    metrics::describe_counter!(
        names::CLOSURES_TOTAL,
        "Total number of transport closures reported to handlers"
    );
}

/// Record a message.
pub(crate) fn record_message(transport: &'static str, direction: &'static str, bytes: usize) {
    counter!(names::MESSAGES_TOTAL, "transport" => transport, "direction" => direction)
        .increment(1);
    counter!(names::MESSAGES_BYTES, "transport" => transport, "direction" => direction)
        .increment(bytes as u64);
}

/// Record a closure reported to the handler.
pub(crate) fn record_closure(transport: &'static str, clean: bool) {
    let outcome = if clean { "clean" } else { "error" };
    counter!(names::CLOSURES_TOTAL, "transport" => transport, "outcome" => outcome).increment(1);
}
