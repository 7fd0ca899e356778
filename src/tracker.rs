//! Entity phase tracker: the authoritative current phase of each entity.
//!
//! Direct moves (kanban drag) may jump to any phase. Sequential moves
//! (advance / retreat) step one ordinal at a time and are written with a
//! compare-and-swap on the phase they started from, so two racing steps
//! cannot both apply.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{Instrument, info, warn};

use crate::catalog::{self, PhaseCatalog};
use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind, MoveKind};
use crate::model::*;
use crate::store::Store;
use crate::telemetry::metrics;
use crate::telemetry::phase::{record_phase_change, start_transition_span};

#[derive(Clone)]
pub struct PhaseTracker {
    store: Arc<dyn Store>,
    events: EventBus,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Forward,
    Back,
}

impl PhaseTracker {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Current phase, or `None` if the entity was never assigned.
    pub async fn get_current_phase(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
    ) -> Result<Option<Phase>> {
        let catalog = self.membership(entity_id, program_id).await?;
        let assignment = self.store.get_assignment(entity_id, program_id).await?;
        match assignment {
            Some(a) => Ok(Some(catalog.get(a.phase_id)?.clone())),
            None => Ok(None),
        }
    }

    /// Current phase, treating an unassigned entity as sitting in the first phase.
    pub async fn current_or_first(&self, entity_id: EntityId, program_id: ProgramId) -> Result<Phase> {
        let catalog = self.membership(entity_id, program_id).await?;
        let assignment = self.store.get_assignment(entity_id, program_id).await?;
        Ok(resolve_current(&catalog, assignment.as_ref())?.clone())
    }

    /// Unconditionally place an entity in `target`.
    pub async fn assign_phase(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        target: PhaseId,
    ) -> Result<PhaseAssignment> {
        let catalog = self.membership(entity_id, program_id).await?;
        let phase = catalog.phases().iter().find(|p| p.id == target).ok_or_else(|| {
            record_rejected(MoveKind::Assign);
            Error::InvalidPhase {
                program: program_id.to_string(),
                phase: target.to_string(),
            }
        })?;
        self.write(&catalog, entity_id, phase, MoveKind::Assign).await
    }

    /// Move to the next phase. Unassigned entities count as being in the first.
    pub async fn advance(&self, entity_id: EntityId, program_id: ProgramId) -> Result<PhaseAssignment> {
        self.step(entity_id, program_id, Step::Forward).await
    }

    /// Move to the previous phase.
    pub async fn retreat(&self, entity_id: EntityId, program_id: ProgramId) -> Result<PhaseAssignment> {
        self.step(entity_id, program_id, Step::Back).await
    }

    /// Place an entity using a free-text phase name from legacy data.
    pub async fn assign_by_name(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        phase_name: &str,
    ) -> Result<PhaseAssignment> {
        let catalog = self.membership(entity_id, program_id).await?;
        let phase = catalog.resolve_name(phase_name).inspect_err(|_| {
            record_rejected(MoveKind::Legacy);
        })?;
        self.write(&catalog, entity_id, phase, MoveKind::Legacy).await
    }

    /// Load the catalog and check that the entity belongs to the program.
    pub(crate) async fn membership(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
    ) -> Result<PhaseCatalog> {
        let catalog = catalog::load(self.store.as_ref(), program_id).await?;
        match self.store.get_entity(entity_id).await? {
            Some(entity) if entity.program_id == program_id => Ok(catalog),
            _ => Err(Error::NotFound(format!(
                "entity {entity_id} in program {program_id}"
            ))),
        }
    }

    async fn write(
        &self,
        catalog: &PhaseCatalog,
        entity_id: EntityId,
        phase: &Phase,
        via: MoveKind,
    ) -> Result<PhaseAssignment> {
        let program_id = catalog.program_id();
        let span = start_transition_span(&via.to_string(), program_id, entity_id);

        async {
            let change = self
                .store
                .upsert_assignment(entity_id, program_id, phase.id)
                .await?;
            let from = change
                .previous
                .and_then(|id| catalog.get(id).ok())
                .map(|p| p.name.as_str());
            record_phase_change(&span, from, &phase.name);
            self.publish(program_id, entity_id, change.previous, phase.id, via);
            Ok(change.assignment)
        }
        .instrument(span.clone())
        .await
    }

    async fn step(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        step: Step,
    ) -> Result<PhaseAssignment> {
        let via = match step {
            Step::Forward => MoveKind::Advance,
            Step::Back => MoveKind::Retreat,
        };
        let catalog = self.membership(entity_id, program_id).await?;
        let span = start_transition_span(&via.to_string(), program_id, entity_id);

        async {
            let assignment = self.store.get_assignment(entity_id, program_id).await?;
            let current = resolve_current(&catalog, assignment.as_ref())?;

            let target = match step {
                Step::Forward => catalog.next(current.id)?,
                Step::Back => catalog.previous(current.id)?,
            };
            let Some(target) = target else {
                record_rejected(via);
                return Err(match step {
                    Step::Forward => Error::AlreadyTerminal(entity_id.to_string()),
                    Step::Back => Error::AlreadyAtStart(entity_id.to_string()),
                });
            };

            let expected = assignment.as_ref().map(|a| a.phase_id);
            let Some(written) = self
                .store
                .swap_assignment(entity_id, program_id, expected, target.id)
                .await?
            else {
                warn!(%entity_id, %program_id, "phase changed underneath a sequential move");
                metrics::phase_transitions().add(
                    1,
                    &[
                        KeyValue::new("operation", via.to_string()),
                        KeyValue::new("result", "conflict"),
                    ],
                );
                return Err(Error::Conflict(format!(
                    "phase of entity {entity_id} changed concurrently; re-fetch and retry"
                )));
            };

            record_phase_change(&span, Some(&current.name), &target.name);
            self.publish(program_id, entity_id, expected, target.id, via);
            Ok(written)
        }
        .instrument(span.clone())
        .await
    }

    fn publish(
        &self,
        program_id: ProgramId,
        entity_id: EntityId,
        from: Option<PhaseId>,
        to: PhaseId,
        via: MoveKind,
    ) {
        info!(%program_id, %entity_id, %to, %via, "phase assigned");
        metrics::phase_transitions().add(
            1,
            &[
                KeyValue::new("operation", via.to_string()),
                KeyValue::new("result", "ok"),
            ],
        );
        self.events.publish(
            program_id,
            EventKind::PhaseAssigned {
                entity_id,
                from,
                to,
                via,
            },
        );
    }
}

/// The phase an assignment points at, or the first phase if there is none.
pub(crate) fn resolve_current<'a>(
    catalog: &'a PhaseCatalog,
    assignment: Option<&PhaseAssignment>,
) -> Result<&'a Phase> {
    match assignment {
        Some(a) => catalog.get(a.phase_id),
        None => catalog.first().ok_or_else(|| {
            Error::NotFound(format!("phases of program {}", catalog.program_id()))
        }),
    }
}

fn record_rejected(via: MoveKind) {
    metrics::phase_transitions().add(
        1,
        &[
            KeyValue::new("operation", via.to_string()),
            KeyValue::new("result", "rejected"),
        ],
    );
}
