//! Read-side derivations over cache snapshots

use crate::types::{FilterMode, Ticket, TicketId, User, UserId};

pub const UNASSIGNED_LABEL: &str = "Unassigned";
pub const UNKNOWN_ASSIGNEE_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Ticket),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Ticket> {
        match self {
            Lookup::Found(ticket) => Some(ticket),
            Lookup::NotFound => None,
        }
    }
}

/// Keeps cache order.
pub fn filter_tickets(tickets: &[Ticket], mode: FilterMode) -> Vec<Ticket> {
    tickets
        .iter()
        .filter(|ticket| mode.matches(ticket))
        .cloned()
        .collect()
}

pub fn resolve_ticket(tickets: &[Ticket], id: TicketId) -> Lookup<'_> {
    match tickets.iter().find(|ticket| ticket.id == id) {
        Some(ticket) => Lookup::Found(ticket),
        None => Lookup::NotFound,
    }
}

/// Resolves a raw route segment. Malformed ids resolve to `NotFound` just
/// like unknown ones.
pub fn resolve_ticket_str<'a>(tickets: &'a [Ticket], raw_id: &str) -> Lookup<'a> {
    match parse_ticket_id(raw_id) {
        Some(id) => resolve_ticket(tickets, id),
        None => Lookup::NotFound,
    }
}

pub fn parse_ticket_id(raw: &str) -> Option<TicketId> {
    raw.trim()
        .trim_start_matches('#')
        .parse::<u64>()
        .ok()
        .map(TicketId)
}

pub fn resolve_assignee_name(users: &[User], assignee_id: Option<UserId>) -> String {
    let Some(assignee_id) = assignee_id else {
        return UNASSIGNED_LABEL.to_string();
    };

    users
        .iter()
        .find(|user| user.id == assignee_id)
        .map(|user| user.name.clone())
        .unwrap_or_else(|| UNKNOWN_ASSIGNEE_LABEL.to_string())
}
