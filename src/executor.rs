//! Server-confirmed mutations against the remote API and the entity cache.
//!
//! Every ticket mutation follows the same shape: check the ticket is cached,
//! claim the ticket in the operation tracker (rejecting if it is busy), await
//! the remote call, and only on success write the affected fields into the
//! cache. The claim is an [`OperationGuard`], so the ticket returns to idle on
//! success, on failure and on unwind alike.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ApiError, TicketApi};
use crate::store::{OperationGuard, OperationStatus, Store};
use crate::types::{NewTicket, Ticket, TicketId, UserId};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Assign,
    Unassign,
    Complete,
    Incomplete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Assign => "assign",
            MutationKind::Unassign => "unassign",
            MutationKind::Complete => "complete",
            MutationKind::Incomplete => "incomplete",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            MutationKind::Create => "Failed to add ticket",
            MutationKind::Assign => "Failed to assign ticket",
            MutationKind::Unassign => "Failed to unassign ticket",
            MutationKind::Complete => "Failed to complete ticket",
            MutationKind::Incomplete => "Failed to mark ticket as incomplete",
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MutationError {
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),
    #[error("ticket description cannot be empty")]
    EmptyDescription,
    #[error("ticket {ticket_id} already has an operation in flight ({})", .status.as_str())]
    Busy {
        ticket_id: TicketId,
        status: OperationStatus,
    },
    #[error("{}: {source}", .kind.failure_message())]
    Remote {
        kind: MutationKind,
        #[source]
        source: ApiError,
    },
    #[error("mutation task ended unexpectedly: {0}")]
    Interrupted(String),
}

/// Routing of the assignee select control: an empty, zero or unparsable value
/// unassigns, a positive user id assigns.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AssigneeSelection {
    Unassign,
    Assign(UserId),
}

impl AssigneeSelection {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(id) if id > 0 => AssigneeSelection::Assign(UserId(id)),
            _ => AssigneeSelection::Unassign,
        }
    }

    /// Value the select control shows for a ticket's current assignee.
    pub fn select_value(assignee: Option<UserId>) -> String {
        assignee.map(|id| id.to_string()).unwrap_or_default()
    }
}

/// One user-initiated mutation, as dispatched by a view.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Action {
    Create(String),
    SetAssignee(TicketId, AssigneeSelection),
    Assign(TicketId, UserId),
    Unassign(TicketId),
    Complete(TicketId),
    Incomplete(TicketId),
    ToggleCompletion(TicketId),
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Created { ticket: Ticket },
    Updated { ticket_id: TicketId },
    Toggled { ticket_id: TicketId, completed: bool },
}

/// Handle to a mutation running on the tokio runtime.
#[derive(Debug)]
pub struct PendingMutation<T> {
    handle: JoinHandle<Result<T, MutationError>>,
}

impl<T> PendingMutation<T> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<T, MutationError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(MutationError::Interrupted(err.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct MutationExecutor {
    api: Arc<dyn TicketApi>,
    store: Store,
}

impl MutationExecutor {
    pub fn new(api: Arc<dyn TicketApi>, store: Store) -> Self {
        Self { api, store }
    }

    pub async fn create(&self, description: &str) -> Result<Ticket, MutationError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(MutationError::EmptyDescription);
        }

        let created = self
            .api
            .create_ticket(NewTicket {
                description: description.to_string(),
            })
            .await
            .map_err(|source| {
                warn!(error = %source, operation = "create", "ticket mutation failed");
                MutationError::Remote {
                    kind: MutationKind::Create,
                    source,
                }
            })?;

        info!(ticket_id = %created.id, operation = "create", "ticket created");
        self.store
            .update_cache(|cache| cache.append_ticket(created.clone()));
        Ok(created)
    }

    pub async fn assign(&self, ticket_id: TicketId, user_id: UserId) -> Result<(), MutationError> {
        let guard = self.claim(ticket_id, OperationStatus::Assigning)?;
        let result = self.api.assign(ticket_id, user_id).await;
        self.settle(guard, MutationKind::Assign, result, |ticket| {
            ticket.assignee_id = Some(user_id)
        })
    }

    pub async fn unassign(&self, ticket_id: TicketId) -> Result<(), MutationError> {
        let guard = self.claim(ticket_id, OperationStatus::Unassigning)?;
        let result = self.api.unassign(ticket_id).await;
        self.settle(guard, MutationKind::Unassign, result, |ticket| {
            ticket.assignee_id = None
        })
    }

    pub async fn complete(&self, ticket_id: TicketId) -> Result<(), MutationError> {
        let guard = self.claim(ticket_id, OperationStatus::Toggling)?;
        self.set_completed(guard, true).await
    }

    pub async fn incomplete(&self, ticket_id: TicketId) -> Result<(), MutationError> {
        let guard = self.claim(ticket_id, OperationStatus::Toggling)?;
        self.set_completed(guard, false).await
    }

    pub async fn set_assignee(
        &self,
        ticket_id: TicketId,
        selection: AssigneeSelection,
    ) -> Result<(), MutationError> {
        match selection {
            AssigneeSelection::Assign(user_id) => self.assign(ticket_id, user_id).await,
            AssigneeSelection::Unassign => self.unassign(ticket_id).await,
        }
    }

    /// Flips completion based on the cached value read after the ticket has
    /// been claimed, so no other mutation of this ticket can interleave
    /// between the read and the remote call. Returns the new value.
    pub async fn toggle_completion(&self, ticket_id: TicketId) -> Result<bool, MutationError> {
        let guard = self.claim(ticket_id, OperationStatus::Toggling)?;
        let completed = self
            .store
            .ticket(ticket_id)
            .map(|ticket| ticket.completed)
            .ok_or(MutationError::TicketNotFound(ticket_id))?;
        let target = !completed;
        self.set_completed(guard, target).await?;
        Ok(target)
    }

    pub async fn execute(&self, action: Action) -> Result<ActionOutcome, MutationError> {
        match action {
            Action::Create(description) => {
                let ticket = self.create(&description).await?;
                Ok(ActionOutcome::Created { ticket })
            }
            Action::SetAssignee(ticket_id, selection) => {
                self.set_assignee(ticket_id, selection).await?;
                Ok(ActionOutcome::Updated { ticket_id })
            }
            Action::Assign(ticket_id, user_id) => {
                self.assign(ticket_id, user_id).await?;
                Ok(ActionOutcome::Updated { ticket_id })
            }
            Action::Unassign(ticket_id) => {
                self.unassign(ticket_id).await?;
                Ok(ActionOutcome::Updated { ticket_id })
            }
            Action::Complete(ticket_id) => {
                self.complete(ticket_id).await?;
                Ok(ActionOutcome::Toggled {
                    ticket_id,
                    completed: true,
                })
            }
            Action::Incomplete(ticket_id) => {
                self.incomplete(ticket_id).await?;
                Ok(ActionOutcome::Toggled {
                    ticket_id,
                    completed: false,
                })
            }
            Action::ToggleCompletion(ticket_id) => {
                let completed = self.toggle_completion(ticket_id).await?;
                Ok(ActionOutcome::Toggled {
                    ticket_id,
                    completed,
                })
            }
        }
    }

    /// Runs `action` on the current tokio runtime and returns immediately.
    pub fn spawn(&self, action: Action) -> PendingMutation<ActionOutcome> {
        let executor = self.clone();
        PendingMutation {
            handle: tokio::spawn(async move { executor.execute(action).await }),
        }
    }

    fn claim(
        &self,
        ticket_id: TicketId,
        status: OperationStatus,
    ) -> Result<OperationGuard, MutationError> {
        if self.store.ticket(ticket_id).is_none() {
            warn!(ticket_id = %ticket_id, operation = status.as_str(), "mutation on unknown ticket");
            return Err(MutationError::TicketNotFound(ticket_id));
        }

        self.store
            .begin_operation(ticket_id, status)
            .map_err(|current| {
                warn!(
                    ticket_id = %ticket_id,
                    requested = status.as_str(),
                    current = current.as_str(),
                    "rejected mutation on busy ticket"
                );
                MutationError::Busy {
                    ticket_id,
                    status: current,
                }
            })
    }

    async fn set_completed(
        &self,
        guard: OperationGuard,
        completed: bool,
    ) -> Result<(), MutationError> {
        let ticket_id = guard.ticket_id();
        let (kind, result) = if completed {
            (MutationKind::Complete, self.api.complete(ticket_id).await)
        } else {
            (MutationKind::Incomplete, self.api.incomplete(ticket_id).await)
        };
        self.settle(guard, kind, result, move |ticket| ticket.completed = completed)
    }

    fn settle(
        &self,
        guard: OperationGuard,
        kind: MutationKind,
        result: Result<(), ApiError>,
        apply: impl FnOnce(&mut Ticket),
    ) -> Result<(), MutationError> {
        let ticket_id = guard.ticket_id();
        match result {
            Ok(()) => {
                let applied = self
                    .store
                    .update_cache(|cache| cache.update_ticket(ticket_id, apply));
                if applied {
                    info!(ticket_id = %ticket_id, operation = kind.as_str(), "ticket updated");
                } else {
                    warn!(
                        ticket_id = %ticket_id,
                        operation = kind.as_str(),
                        "server confirmed mutation for a ticket no longer cached"
                    );
                }
                drop(guard);
                Ok(())
            }
            Err(source) => {
                drop(guard);
                warn!(
                    ticket_id = %ticket_id,
                    operation = kind.as_str(),
                    error = %source,
                    "ticket mutation failed"
                );
                Err(MutationError::Remote { kind, source })
            }
        }
    }
}
