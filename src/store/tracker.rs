//! Per-ticket in-flight operation status

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::TicketId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    #[default]
    Idle,
    Assigning,
    Unassigning,
    Toggling,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Idle => "idle",
            OperationStatus::Assigning => "assigning",
            OperationStatus::Unassigning => "unassigning",
            OperationStatus::Toggling => "toggling",
        }
    }

    pub fn is_busy(self) -> bool {
        self != OperationStatus::Idle
    }
}

/// Only non-idle tickets are stored, so the map never outgrows the number of
/// operations currently in flight.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    in_flight: HashMap<TicketId, OperationStatus>,
}

impl OperationTracker {
    pub fn status(&self, id: TicketId) -> OperationStatus {
        self.in_flight.get(&id).copied().unwrap_or_default()
    }

    /// Marks `id` as running `status`. Fails with the current status when the
    /// ticket already has an operation in flight. `Idle` is not an operation
    /// and is refused with `Err(Idle)`, leaving the tracker unchanged.
    pub fn try_begin(
        &mut self,
        id: TicketId,
        status: OperationStatus,
    ) -> Result<(), OperationStatus> {
        if let Some(current) = self.in_flight.get(&id) {
            return Err(*current);
        }
        if !status.is_busy() {
            return Err(OperationStatus::Idle);
        }
        self.in_flight.insert(id, status);
        Ok(())
    }

    pub fn finish(&mut self, id: TicketId) -> OperationStatus {
        self.in_flight.remove(&id).unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<TicketId, OperationStatus> {
        self.in_flight.clone()
    }
}
