//! View models for the ticket list and the ticket detail screens.
//!
//! Both views hold a [`Session`](crate::session::Session) handle rather than
//! their own data: every model is re-derived from the shared store, and every
//! write goes through the mutation executor.

mod detail;
mod list;

use serde::Serialize;

use crate::executor::AssigneeSelection;
use crate::projection::UNASSIGNED_LABEL;
use crate::types::User;

pub use detail::{DetailModel, DetailView, TICKET_NOT_FOUND_MESSAGE, TicketDetail};
pub use list::{ListModel, ListView, NO_TICKETS_MESSAGE, TicketRow};

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AssigneeOption {
    pub value: String,
    pub label: String,
}

/// Options of the assignee select: the unassigned entry first, then users in
/// cache order.
pub fn assignee_options(users: &[User]) -> Vec<AssigneeOption> {
    std::iter::once(AssigneeOption {
        value: AssigneeSelection::select_value(None),
        label: UNASSIGNED_LABEL.to_string(),
    })
    .chain(users.iter().map(|user| AssigneeOption {
        value: AssigneeSelection::select_value(Some(user.id)),
        label: user.name.clone(),
    }))
    .collect()
}

pub fn completion_label(completed: bool) -> &'static str {
    if completed { "Completed" } else { "Incomplete" }
}
