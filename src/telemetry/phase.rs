//! Phase transition span helpers.
//!
//! Provides span creation and phase-change recording for entities moving
//! through a program.

use tracing::Span;

use crate::model::{EntityId, ProgramId};

/// Start a span for a phase move or winner declaration.
///
/// The `phase.to` field is declared empty and can be filled via
/// [`record_phase_change`].
pub fn start_transition_span(operation: &str, program_id: ProgramId, entity_id: EntityId) -> Span {
    tracing::info_span!(
        "phase.transition",
        "phase.operation" = operation,
        "program.id" = %program_id,
        "entity.id" = %entity_id,
        "phase.to" = tracing::field::Empty,
    )
}

/// Record a phase change on the given span.
///
/// Emits a tracing `info` event scoped to the span.
pub fn record_phase_change(span: &Span, from: Option<&str>, to: &str) {
    span.record("phase.to", to);
    span.in_scope(|| {
        tracing::info!(from = from.unwrap_or("-"), to = to, "phase_change");
    });
}
