use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::settings::Settings;
use crate::types::{NewTicket, Ticket, TicketId, User, UserId};

use super::{ApiError, TicketApi};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3333";
pub const DEFAULT_API_PREFIX: &str = "/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub prefix: String,
    /// `None` leaves requests without a deadline.
    pub request_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout: None,
        }
    }
}

impl ApiConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.api_base_url.clone(),
            prefix: settings.api_prefix.clone(),
            request_timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTicketApi {
    config: ApiConfig,
    client: Client,
}

impl HttpTicketApi {
    pub fn new(mut config: ApiConfig) -> Result<Self, ApiError> {
        config.base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if config.base_url.is_empty() {
            return Err(ApiError::Configuration(
                "api base url is empty. Provide a non-empty URL.".to_string(),
            ));
        }
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ApiError::Configuration(format!(
                "api base url '{}' must start with http:// or https://",
                config.base_url
            )));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|error| {
            ApiError::Configuration(format!("failed to build HTTP client: {error}"))
        })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        let suffix = path.trim_start_matches('/');
        if prefix.is_empty() {
            format!("{}/{suffix}", self.config.base_url)
        } else {
            format!("{}/{prefix}/{suffix}", self.config.base_url)
        }
    }

    fn request(&self, method: Method, path: &str) -> (RequestBuilder, String) {
        let url = self.endpoint(path);
        debug!(%method, %url, "issuing ticket api request");
        (self.client.request(method, &url), url)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|error| ApiError::Transport(format!("{endpoint}: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Transport(format!("{endpoint}: {error}")))?;
        serde_json::from_str(&body).map_err(|error| ApiError::Decode(format!("{endpoint}: {error}")))
    }

    async fn request_status_only(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<(), ApiError> {
        let response = request
            .send()
            .await
            .map_err(|error| ApiError::Transport(format!("{endpoint}: {error}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            })
        }
    }
}

#[async_trait]
impl TicketApi for HttpTicketApi {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, ApiError> {
        let (request, url) = self.request(Method::GET, "tickets");
        self.request_json(request, &url).await
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let (request, url) = self.request(Method::GET, "users");
        self.request_json(request, &url).await
    }

    async fn create_ticket(&self, request: NewTicket) -> Result<Ticket, ApiError> {
        let (builder, url) = self.request(Method::POST, "tickets");
        self.request_json(builder.json(&request), &url).await
    }

    async fn assign(&self, ticket_id: TicketId, user_id: UserId) -> Result<(), ApiError> {
        let (request, url) = self.request(
            Method::PUT,
            &format!("tickets/{ticket_id}/assign/{user_id}"),
        );
        self.request_status_only(request, &url).await
    }

    async fn unassign(&self, ticket_id: TicketId) -> Result<(), ApiError> {
        let (request, url) = self.request(Method::PUT, &format!("tickets/{ticket_id}/unassign"));
        self.request_status_only(request, &url).await
    }

    async fn complete(&self, ticket_id: TicketId) -> Result<(), ApiError> {
        let (request, url) = self.request(Method::PUT, &format!("tickets/{ticket_id}/complete"));
        self.request_status_only(request, &url).await
    }

    async fn incomplete(&self, ticket_id: TicketId) -> Result<(), ApiError> {
        let (request, url) =
            self.request(Method::DELETE, &format!("tickets/{ticket_id}/complete"));
        self.request_status_only(request, &url).await
    }
}
