//! Remote ticket API collaborator

#[cfg(test)]
pub(crate) mod fake;
mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{NewTicket, Ticket, TicketId, User, UserId};

pub use http::{ApiConfig, DEFAULT_API_BASE_URL, DEFAULT_API_PREFIX, HttpTicketApi};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("response was malformed: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The remote source of truth. Every call either succeeds with a 2xx
/// response or reports an [`ApiError`].
#[async_trait]
pub trait TicketApi: Send + Sync {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, ApiError>;
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    async fn create_ticket(&self, request: NewTicket) -> Result<Ticket, ApiError>;
    async fn assign(&self, ticket_id: TicketId, user_id: UserId) -> Result<(), ApiError>;
    async fn unassign(&self, ticket_id: TicketId) -> Result<(), ApiError>;
    async fn complete(&self, ticket_id: TicketId) -> Result<(), ApiError>;
    async fn incomplete(&self, ticket_id: TicketId) -> Result<(), ApiError>;
}
