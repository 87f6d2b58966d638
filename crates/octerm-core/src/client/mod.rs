//! HTTP client for the agent server's catalog and event feed.

mod error;
mod types;

use std::time::Duration;

pub use error::{ClientError, ClientErrorKind, ClientResult};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
pub use types::{MessageSummary, ModelRef, PromptOptions, SessionInfo, TokenUsage};
use types::{CreateSessionRequest, CreateSessionResponse, MessageEntry, PromptRequest};

use crate::config::ServerConfig;
use crate::feed::{EventFeed, SseParser};
use crate::session::Catalog;

/// Standard User-Agent header for octerm requests.
pub const USER_AGENT: &str = concat!("octerm/", env!("CARGO_PKG_VERSION"));

/// Thin client over the agent server's REST endpoints.
///
/// Catalog calls share a client with a request timeout; the event feed uses a
/// second client without one so the long-lived connection is never cut.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    http: reqwest::Client,
    stream_http: reqwest::Client,
}

impl HttpClient {
    /// Creates a client for `base_url` (no trailing slash).
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ClientError::from_reqwest(&e))?;
        let stream_http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::from_reqwest(&e))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            stream_http,
        })
    }

    /// Creates a client from the `[server]` section.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let base_url = config.base_url()?;
        Ok(Self::new(base_url, config.request_timeout())?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds `/session/{id}/{action}` with the id percent-encoded as one segment.
    fn session_url(&self, session_id: &str, action: &str) -> ClientResult<url::Url> {
        let mut url = url::Url::parse(&self.base_url).map_err(|e| {
            ClientError::parse(format!("Invalid base URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::parse(format!("Base URL cannot hold a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["session", session_id, action]);
        Ok(url)
    }

    /// Returns true when `GET /global/health` answers 200.
    ///
    /// # Errors
    /// Returns an error if the server cannot be reached.
    pub async fn health(&self) -> ClientResult<bool> {
        let response = self
            .http
            .get(self.url("/global/health"))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }

    /// Lists all sessions known to the server.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-200 status or an undecodable body.
    pub async fn list_sessions(&self) -> ClientResult<Vec<SessionInfo>> {
        let response = self
            .http
            .get(self.url("/session"))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        decode_json(response, &[200]).await
    }

    /// Creates a session with `title` and returns its id.
    ///
    /// # Errors
    /// Returns an error on transport failure, an unexpected status or a response without an id.
    pub async fn create_session(&self, title: &str) -> ClientResult<String> {
        let response = self
            .http
            .post(self.url("/session"))
            .json(&CreateSessionRequest { title })
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        let created: CreateSessionResponse = decode_json(response, &[200, 201, 202]).await?;
        info!(session_id = %created.id, title, "created session");
        Ok(created.id)
    }

    /// Lists the messages of a session with their token usage.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-200 status or an undecodable body.
    pub async fn list_messages(&self, session_id: &str) -> ClientResult<Vec<MessageSummary>> {
        let response = self
            .http
            .get(self.session_url(session_id, "message")?)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        let entries: Vec<MessageEntry> = decode_json(response, &[200]).await?;
        Ok(entries.into_iter().map(MessageSummary::from).collect())
    }

    /// Queues a text prompt on a session. The answer arrives on the event feed.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unexpected status.
    pub async fn send_prompt(
        &self,
        session_id: &str,
        text: &str,
        options: &PromptOptions,
    ) -> ClientResult<()> {
        debug!(session_id, chars = text.chars().count(), "sending prompt");
        let response = self
            .http
            .post(self.session_url(session_id, "prompt_async")?)
            .json(&PromptRequest::text(text, options))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        if matches!(status, 200 | 202 | 204) {
            debug!(session_id, status, "prompt accepted");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::http_status(status, &body))
        }
    }

    /// Opens the server's event feed (`GET /event`).
    ///
    /// # Errors
    /// Returns an error if the connection fails or the server answers with a non-success status.
    pub async fn subscribe(&self) -> ClientResult<EventFeed> {
        let response = self
            .stream_http
            .get(self.url("/event"))
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::http_status(status.as_u16(), &body));
        }

        info!(url = %self.url("/event"), "connected to event feed");
        Ok(Box::pin(SseParser::new(response.bytes_stream().boxed())))
    }
}

async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    accepted: &[u16],
) -> ClientResult<T> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::from_reqwest(&e))?;
    if !accepted.contains(&status) {
        return Err(ClientError::http_status(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| {
        let mut err = ClientError::parse(format!("Failed to decode response: {e}"));
        err.details = Some(body);
        err
    })
}

impl Catalog for HttpClient {
    async fn list_sessions(&self) -> ClientResult<Vec<SessionInfo>> {
        HttpClient::list_sessions(self).await
    }

    async fn list_messages(&self, session_id: &str) -> ClientResult<Vec<MessageSummary>> {
        HttpClient::list_messages(self, session_id).await
    }

    async fn create_session(&self, title: &str) -> ClientResult<String> {
        HttpClient::create_session(self, title).await
    }
}
