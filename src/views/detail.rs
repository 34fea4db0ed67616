use serde::Serialize;

use crate::bootstrap::LoadState;
use crate::executor::{AssigneeSelection, MutationError};
use crate::projection::{Lookup, parse_ticket_id, resolve_assignee_name, resolve_ticket};
use crate::session::Session;
use crate::store::OperationStatus;
use crate::types::TicketId;

use super::{AssigneeOption, assignee_options, completion_label};

pub const TICKET_NOT_FOUND_MESSAGE: &str = "Ticket not found";

const UPDATING_LABEL: &str = "Updating...";

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TicketDetail {
    pub id: TicketId,
    pub heading: String,
    pub description: String,
    pub completed: bool,
    pub status_label: String,
    pub assignee_name: String,
    pub assignee_value: String,
    pub assignee_options: Vec<AssigneeOption>,
    pub status: OperationStatus,
    pub controls_disabled: bool,
    pub toggle_label: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DetailModel {
    Loading,
    LoadFailed { message: String },
    NotFound { message: String },
    Ticket(TicketDetail),
}

impl DetailModel {
    pub fn ticket(self) -> Option<TicketDetail> {
        match self {
            DetailModel::Ticket(detail) => Some(detail),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct DetailView {
    session: Session,
    raw_id: String,
}

impl DetailView {
    pub fn new(session: Session, raw_id: impl Into<String>) -> Self {
        Self {
            session,
            raw_id: raw_id.into(),
        }
    }

    pub fn ticket_id(&self) -> Option<TicketId> {
        parse_ticket_id(&self.raw_id)
    }

    pub fn model(&self) -> DetailModel {
        let store = self.session.store();
        match store.load_state() {
            LoadState::Loading => return DetailModel::Loading,
            LoadState::Failed(message) => return DetailModel::LoadFailed { message },
            LoadState::Ready => {}
        }

        let not_found = DetailModel::NotFound {
            message: TICKET_NOT_FOUND_MESSAGE.to_string(),
        };
        let Some(id) = self.ticket_id() else {
            return not_found;
        };
        let tickets = store.tickets();
        let Lookup::Found(ticket) = resolve_ticket(&tickets, id) else {
            return not_found;
        };

        let users = store.users();
        let status = store.status(id);
        DetailModel::Ticket(TicketDetail {
            id: ticket.id,
            heading: format!("Ticket #{}", ticket.id),
            description: ticket.description.clone(),
            completed: ticket.completed,
            status_label: completion_label(ticket.completed).to_string(),
            assignee_name: resolve_assignee_name(&users, ticket.assignee_id),
            assignee_value: AssigneeSelection::select_value(ticket.assignee_id),
            assignee_options: assignee_options(&users),
            status,
            controls_disabled: status.is_busy(),
            toggle_label: if status.is_busy() {
                UPDATING_LABEL
            } else if ticket.completed {
                "Mark as Incomplete"
            } else {
                "Mark as Complete"
            }
            .to_string(),
        })
    }

    /// Returns `Ok(None)` without contacting the server when the route id does
    /// not parse.
    pub async fn select_assignee(
        &self,
        raw_value: &str,
    ) -> Result<Option<AssigneeSelection>, MutationError> {
        let Some(id) = self.ticket_id() else {
            return Ok(None);
        };
        let selection = AssigneeSelection::parse(raw_value);
        self.session.executor().set_assignee(id, selection).await?;
        Ok(Some(selection))
    }

    pub async fn toggle(&self) -> Result<Option<bool>, MutationError> {
        let Some(id) = self.ticket_id() else {
            return Ok(None);
        };
        self.session
            .executor()
            .toggle_completion(id)
            .await
            .map(Some)
    }
}
