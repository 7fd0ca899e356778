//! Metric instrument factories for cohort-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"cohort-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for cohort-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("cohort-rs")
}

/// Counter: phase moves.
/// Labels: `operation` ("assign" | "advance" | "retreat" | "legacy"),
/// `result` ("ok" | "rejected" | "conflict").
pub fn phase_transitions() -> Counter<u64> {
    meter()
        .u64_counter("cohort.phase.transitions")
        .with_description("Number of entity phase moves")
        .build()
}

/// Counter: winner declarations.
/// Labels: `result` ("declared" | "existing" | "conflict" | "rejected").
pub fn winner_declarations() -> Counter<u64> {
    meter()
        .u64_counter("cohort.winner.declarations")
        .with_description("Number of winner declaration attempts")
        .build()
}

/// Counter: program status changes.
/// Labels: `from`, `to`.
pub fn program_status_changes() -> Counter<u64> {
    meter()
        .u64_counter("cohort.program.status_changes")
        .with_description("Number of program status transitions")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("cohort.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
