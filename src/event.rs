//! Structured events emitted on every phase or winner change.
//!
//! Subscribers (kanban boards, dashboards, audit logs) receive the fresh
//! authoritative state instead of polling for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::model::{EntityId, EntityStatus, PhaseId, ProgramId, ProgramStatus};

const CHANNEL_CAPACITY: usize = 256;

/// A structured event scoped to one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramEvent {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub program_id: ProgramId,
    pub kind: EventKind,
}

/// How an entity got to its new phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Assign,
    Advance,
    Retreat,
    Legacy,
}

impl std::fmt::Display for MoveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MoveKind::Assign => "assign",
            MoveKind::Advance => "advance",
            MoveKind::Retreat => "retreat",
            MoveKind::Legacy => "legacy",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ProgramCreated {
        name: String,
        phases: usize,
    },
    ProgramStatusChanged {
        from: ProgramStatus,
        to: ProgramStatus,
    },
    EntityRegistered {
        entity_id: EntityId,
        name: String,
    },
    EntityStatusChanged {
        entity_id: EntityId,
        status: EntityStatus,
    },
    PhaseAssigned {
        entity_id: EntityId,
        from: Option<PhaseId>,
        to: PhaseId,
        via: MoveKind,
    },
    WinnerDeclared {
        entity_id: EntityId,
        phase_id: PhaseId,
    },
}

/// Fan-out channel for program events.
///
/// Publishing never blocks; with no subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProgramEvent>,
    seq: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamp and broadcast an event.
    pub fn publish(&self, program_id: ProgramId, kind: EventKind) -> ProgramEvent {
        let event = ProgramEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            program_id,
            kind,
        };
        let _ = self.tx.send(event.clone());
        event
    }

    /// Subscribe to events for every program. Filter by `program_id` downstream.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgramEvent> {
        self.tx.subscribe()
    }
}
