//! Session-scoped entity cache of tickets and users

use tracing::warn;

use crate::types::{Ticket, TicketId, User};

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct EntityCache {
    tickets: Vec<Ticket>,
    users: Vec<User>,
}

impl EntityCache {
    /// Builds a cache from a bootstrap result, collapsing duplicate ids so the
    /// later record wins while keeping the first position.
    pub fn from_snapshot(tickets: Vec<Ticket>, users: Vec<User>) -> Self {
        let mut cache = Self::default();
        for ticket in tickets {
            cache.upsert_ticket(ticket);
        }
        for user in users {
            if let Some(existing) = cache.users.iter_mut().find(|u| u.id == user.id) {
                *existing = user;
            } else {
                cache.users.push(user);
            }
        }
        cache
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.users.clone()
    }

    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.tickets.iter().find(|t| t.id == id).cloned()
    }

    pub fn contains_ticket(&self, id: TicketId) -> bool {
        self.tickets.iter().any(|t| t.id == id)
    }

    /// Replaces the ticket with a matching id in place, or appends it.
    pub fn upsert_ticket(&mut self, ticket: Ticket) {
        match self.tickets.iter_mut().find(|t| t.id == ticket.id) {
            Some(existing) => *existing = ticket,
            None => self.tickets.push(ticket),
        }
    }

    /// Appends a newly created ticket. An id that is already cached is
    /// replaced in place instead so ids stay unique.
    pub fn append_ticket(&mut self, ticket: Ticket) {
        if self.contains_ticket(ticket.id) {
            warn!(ticket_id = %ticket.id, "append of an already cached ticket id; replacing in place");
        }
        self.upsert_ticket(ticket);
    }

    /// Applies `update` to the single ticket with `id`, leaving every other
    /// ticket and field untouched. Returns false when the id is unknown.
    pub fn update_ticket(&mut self, id: TicketId, update: impl FnOnce(&mut Ticket)) -> bool {
        match self.tickets.iter_mut().find(|t| t.id == id) {
            Some(ticket) => {
                update(ticket);
                true
            }
            None => false,
        }
    }
}
