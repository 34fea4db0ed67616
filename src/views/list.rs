use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use crate::bootstrap::LoadState;
use crate::executor::{AssigneeSelection, MutationError};
use crate::projection::{filter_tickets, resolve_assignee_name};
use crate::session::Session;
use crate::store::OperationStatus;
use crate::types::{FilterMode, Ticket, TicketId};

use super::{AssigneeOption, assignee_options, completion_label};

pub const NO_TICKETS_MESSAGE: &str = "No tickets found.";

const ADD_LABEL: &str = "Add Ticket";
const ADDING_LABEL: &str = "Adding...";
const TOGGLING_LABEL: &str = "...";

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TicketRow {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub assignee_name: String,
    pub assignee_label: String,
    pub assignee_value: String,
    pub completed: bool,
    pub status: OperationStatus,
    pub controls_disabled: bool,
    pub toggle_label: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ListModel {
    pub load_state: LoadState,
    pub title: String,
    pub filter: FilterMode,
    pub rows: Vec<TicketRow>,
    pub empty_message: Option<String>,
    pub assignee_options: Vec<AssigneeOption>,
    pub draft: String,
    pub adding: bool,
    pub add_label: String,
    pub add_disabled: bool,
}

#[derive(Debug, Default)]
struct ListState {
    filter: FilterMode,
    draft: String,
    adding: bool,
}

/// Clears the adding flag when a submit finishes or is cancelled.
struct AddingGuard {
    state: Arc<Mutex<ListState>>,
}

impl Drop for AddingGuard {
    fn drop(&mut self) {
        match self.state.lock() {
            Ok(mut state) => state.adding = false,
            Err(poisoned) => poisoned.into_inner().adding = false,
        }
    }
}

#[derive(Clone)]
pub struct ListView {
    session: Session,
    state: Arc<Mutex<ListState>>,
}

impl ListView {
    pub fn new(session: Session, filter: FilterMode) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(ListState {
                filter,
                ..ListState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ListState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn filter(&self) -> FilterMode {
        self.state().filter
    }

    pub fn set_filter(&self, filter: FilterMode) {
        self.state().filter = filter;
    }

    pub fn set_draft(&self, draft: impl Into<String>) {
        self.state().draft = draft.into();
    }

    pub fn model(&self) -> ListModel {
        let store = self.session.store();
        let tickets = store.tickets();
        let users = store.users();
        let statuses = store.statuses();
        let (filter, draft, adding) = {
            let state = self.state();
            (state.filter, state.draft.clone(), state.adding)
        };

        let rows: Vec<TicketRow> = filter_tickets(&tickets, filter)
            .into_iter()
            .map(|ticket| {
                let status = statuses.get(&ticket.id).copied().unwrap_or_default();
                let assignee_name = resolve_assignee_name(&users, ticket.assignee_id);
                TicketRow {
                    id: ticket.id,
                    title: format!("#{} - {}", ticket.id, ticket.description),
                    assignee_label: format!("Assigned to: {assignee_name}"),
                    assignee_value: AssigneeSelection::select_value(ticket.assignee_id),
                    toggle_label: if status == OperationStatus::Toggling {
                        TOGGLING_LABEL.to_string()
                    } else {
                        completion_label(ticket.completed).to_string()
                    },
                    controls_disabled: status.is_busy(),
                    assignee_name,
                    description: ticket.description,
                    completed: ticket.completed,
                    status,
                }
            })
            .collect();

        ListModel {
            load_state: store.load_state(),
            title: format!("Tickets ({})", rows.len()),
            filter,
            empty_message: rows.is_empty().then(|| NO_TICKETS_MESSAGE.to_string()),
            rows,
            assignee_options: assignee_options(&users),
            add_label: if adding { ADDING_LABEL } else { ADD_LABEL }.to_string(),
            add_disabled: adding || draft.trim().is_empty(),
            draft,
            adding,
        }
    }

    /// Submits the current draft. A blank draft, or a submit while another
    /// add is still running, does nothing and returns `Ok(None)`. The draft is
    /// cleared only when the server accepted the ticket. The adding flag is
    /// reset even if the returned future is dropped before it completes.
    pub async fn submit(&self) -> Result<Option<Ticket>, MutationError> {
        let draft = {
            let mut state = self.state();
            if state.adding || state.draft.trim().is_empty() {
                debug!(adding = state.adding, "ignoring add submit");
                return Ok(None);
            }
            state.adding = true;
            state.draft.clone()
        };
        let _adding = AddingGuard {
            state: Arc::clone(&self.state),
        };

        match self.session.executor().create(&draft).await {
            Ok(ticket) => {
                self.state().draft.clear();
                Ok(Some(ticket))
            }
            Err(err) => {
                warn!(error = %err, "Failed to add ticket");
                Err(err)
            }
        }
    }

    pub async fn select_assignee(
        &self,
        ticket_id: TicketId,
        raw_value: &str,
    ) -> Result<AssigneeSelection, MutationError> {
        let selection = AssigneeSelection::parse(raw_value);
        self.session
            .executor()
            .set_assignee(ticket_id, selection)
            .await?;
        Ok(selection)
    }

    pub async fn toggle(&self, ticket_id: TicketId) -> Result<bool, MutationError> {
        self.session.executor().toggle_completion(ticket_id).await
    }
}
