//! Scripted in-memory [`TicketApi`] for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::types::{NewTicket, Ticket, TicketId, User, UserId};

use super::{ApiError, TicketApi};

#[derive(Debug, Default)]
struct FakeState {
    tickets: Vec<Ticket>,
    users: Vec<User>,
    failing: HashSet<&'static str>,
    stalled: HashSet<&'static str>,
    calls: Vec<String>,
}

#[derive(Debug, Default)]
struct Hold {
    arrived: Notify,
    release: Notify,
}

#[derive(Debug, Default)]
pub(crate) struct FakeTicketApi {
    state: Mutex<FakeState>,
    holds: Mutex<HashMap<TicketId, Arc<Hold>>>,
}

impl FakeTicketApi {
    pub(crate) fn new(tickets: Vec<Ticket>, users: Vec<User>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                tickets,
                users,
                ..FakeState::default()
            }),
            holds: Mutex::new(HashMap::new()),
        })
    }

    /// Two tickets and two users used throughout the tests.
    pub(crate) fn seeded() -> Arc<Self> {
        Self::new(
            vec![
                Ticket {
                    id: TicketId(1),
                    description: "Install a monitor arm".to_string(),
                    assignee_id: Some(UserId(1)),
                    completed: false,
                },
                Ticket {
                    id: TicketId(2),
                    description: "Move desk".to_string(),
                    assignee_id: None,
                    completed: true,
                },
            ],
            vec![
                User {
                    id: UserId(1),
                    name: "Alice".to_string(),
                },
                User {
                    id: UserId(2),
                    name: "Bob".to_string(),
                },
            ],
        )
    }

    pub(crate) fn fail(&self, operation: &'static str) {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .failing
            .insert(operation);
    }

    pub(crate) fn recover(&self, operation: &'static str) {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .failing
            .remove(operation);
    }

    /// Makes `operation` never resolve, as a server that stops answering.
    pub(crate) fn stall(&self, operation: &'static str) {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .stalled
            .insert(operation);
    }

    pub(crate) fn recover_stall(&self, operation: &'static str) {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .stalled
            .remove(operation);
    }

    pub(crate) fn set_server_tickets(&self, tickets: Vec<Ticket>) {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .tickets = tickets;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .calls
            .clone()
    }

    pub(crate) fn server_ticket(&self, id: TicketId) -> Option<Ticket> {
        self.state
            .lock()
            .expect("fake api state should not be poisoned")
            .tickets
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Makes every mutation on `id` block until [`Self::release`] is called.
    pub(crate) fn hold(&self, id: TicketId) {
        self.holds
            .lock()
            .expect("fake api holds should not be poisoned")
            .insert(id, Arc::new(Hold::default()));
    }

    pub(crate) async fn wait_arrived(&self, id: TicketId) {
        let hold = self.hold_for(id).expect("ticket should be held");
        hold.arrived.notified().await;
    }

    pub(crate) fn release(&self, id: TicketId) {
        if let Some(hold) = self
            .holds
            .lock()
            .expect("fake api holds should not be poisoned")
            .remove(&id)
        {
            hold.release.notify_one();
        }
    }

    fn hold_for(&self, id: TicketId) -> Option<Arc<Hold>> {
        self.holds
            .lock()
            .expect("fake api holds should not be poisoned")
            .get(&id)
            .cloned()
    }

    async fn enter(&self, operation: &'static str, ticket: Option<TicketId>) -> Result<(), ApiError> {
        let stalled = {
            let mut state = self
                .state
                .lock()
                .expect("fake api state should not be poisoned");
            let call = match ticket {
                Some(id) => format!("{operation}:{id}"),
                None => operation.to_string(),
            };
            state.calls.push(call);
            state.stalled.contains(operation)
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        if let Some(hold) = ticket.and_then(|id| self.hold_for(id)) {
            hold.arrived.notify_one();
            hold.release.notified().await;
        }

        let state = self
            .state
            .lock()
            .expect("fake api state should not be poisoned");
        if state.failing.contains(operation) {
            return Err(ApiError::Status {
                status: 500,
                endpoint: operation.to_string(),
            });
        }
        Ok(())
    }

    fn mutate(&self, id: TicketId, update: impl FnOnce(&mut Ticket)) -> Result<(), ApiError> {
        let mut state = self
            .state
            .lock()
            .expect("fake api state should not be poisoned");
        match state.tickets.iter_mut().find(|t| t.id == id) {
            Some(ticket) => {
                update(ticket);
                Ok(())
            }
            None => Err(ApiError::Status {
                status: 404,
                endpoint: format!("tickets/{id}"),
            }),
        }
    }
}

#[async_trait]
impl TicketApi for FakeTicketApi {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, ApiError> {
        self.enter("list_tickets", None).await?;
        Ok(self
            .state
            .lock()
            .expect("fake api state should not be poisoned")
            .tickets
            .clone())
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.enter("list_users", None).await?;
        Ok(self
            .state
            .lock()
            .expect("fake api state should not be poisoned")
            .users
            .clone())
    }

    async fn create_ticket(&self, request: NewTicket) -> Result<Ticket, ApiError> {
        self.enter("create", None).await?;
        let mut state = self
            .state
            .lock()
            .expect("fake api state should not be poisoned");
        let next_id = state.tickets.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        let ticket = Ticket {
            id: TicketId(next_id),
            description: request.description,
            assignee_id: None,
            completed: false,
        };
        state.tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn assign(&self, ticket_id: TicketId, user_id: UserId) -> Result<(), ApiError> {
        self.enter("assign", Some(ticket_id)).await?;
        self.mutate(ticket_id, |t| t.assignee_id = Some(user_id))
    }

    async fn unassign(&self, ticket_id: TicketId) -> Result<(), ApiError> {
        self.enter("unassign", Some(ticket_id)).await?;
        self.mutate(ticket_id, |t| t.assignee_id = None)
    }

    async fn complete(&self, ticket_id: TicketId) -> Result<(), ApiError> {
        self.enter("complete", Some(ticket_id)).await?;
        self.mutate(ticket_id, |t| t.completed = true)
    }

    async fn incomplete(&self, ticket_id: TicketId) -> Result<(), ApiError> {
        self.enter("incomplete", Some(ticket_id)).await?;
        self.mutate(ticket_id, |t| t.completed = false)
    }
}
