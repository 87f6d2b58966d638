//! Line-oriented JSON command dispatcher for scripts and editor plugins.
//!
//! Every input line is a command `{"type": "...", "payload": {...}}`; every
//! output line is `{"type": "...", "data": ...}`. A failing command produces
//! an `error` line and the loop keeps going. Once `sse.start` succeeds,
//! reconciled stream deltas are written as `delta` lines between replies.
//!
//! When stdin closes the dispatcher keeps forwarding deltas until the event
//! stream ends, so `echo '{"type":"sse.start"}' | octerm headless` tails the feed.

use anyhow::{Context, Result, anyhow, bail};
use octerm_core::client::{ClientResult, HttpClient, PromptOptions};
use octerm_core::config::{Config, DefaultsConfig, SessionConfig};
use octerm_core::interrupt::{self, InterruptedError};
use octerm_core::session::Resolver;
use octerm_core::stream::{self, StreamDelta};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One input line.
#[derive(Debug, Deserialize)]
struct Command {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionPayload {
    title: String,
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptPayload {
    text: String,
    provider_id: Option<String>,
    model_id: Option<String>,
}

/// One output line.
#[derive(Debug, Serialize)]
struct Reply {
    #[serde(rename = "type")]
    kind: &'static str,
    data: Value,
}

impl Reply {
    fn new(kind: &'static str, data: impl Serialize) -> Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_value(data)?,
        })
    }
}

/// An open event stream and the token that stops it.
struct Feed {
    deltas: mpsc::Receiver<ClientResult<StreamDelta>>,
    cancel: CancellationToken,
}

pub struct Headless<W> {
    out: W,
    client: HttpClient,
    session: SessionConfig,
    defaults: DefaultsConfig,
    /// Target of `prompt`, set by `session.create`, `session.select` or `session.resolve`.
    session_id: Option<String>,
    feed: Option<Feed>,
}

impl<W: AsyncWrite + Unpin> Headless<W> {
    pub fn new(config: &Config, client: HttpClient, out: W) -> Self {
        Self {
            out,
            client,
            session: config.session.clone(),
            defaults: config.defaults.clone(),
            session_id: None,
            feed: None,
        }
    }

    /// Processes commands from `input` until it closes and the stream (if any) ends.
    ///
    /// # Errors
    /// Returns an error only if reading input or writing output fails, or on Ctrl+C.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let interrupted = interrupt::cancellation_token();
        let mut lines = input.lines();
        let mut input_open = true;

        self.emit(&Reply::new(
            "ready",
            json!({ "server": self.client.base_url() }),
        )?)
        .await?;

        while input_open || self.feed.is_some() {
            tokio::select! {
                biased;
                () = interrupted.cancelled() => {
                    self.stop_feed();
                    return Err(InterruptedError.into());
                }
                item = next_delta(self.feed.as_mut()) => self.handle_stream_item(item).await?,
                line = lines.next_line(), if input_open => {
                    match line.context("read command")? {
                        Some(line) => self.handle_line(&line).await?,
                        None => {
                            debug!("headless input closed");
                            input_open = false;
                        }
                    }
                }
            }
        }

        self.stop_feed();
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let reply = match serde_json::from_str::<Command>(line) {
            Ok(command) => self.execute(command).await,
            Err(err) => Err(anyhow!("invalid JSON: {err}")),
        };

        match reply {
            Ok(reply) => self.emit(&reply).await,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "headless command failed");
                self.emit_error(&format!("{err:#}")).await
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Reply> {
        debug!(command = %command.kind, "headless command");
        match command.kind.as_str() {
            "health" => {
                let healthy = self.client.health().await.unwrap_or(false);
                Reply::new("health", json!({ "healthy": healthy }))
            }
            "session.create" => {
                let payload: SessionPayload = parse_payload(command.payload)?;
                let id = self.client.create_session(&payload.title).await?;
                self.session_id = Some(id.clone());
                Reply::new("session.created", json!({ "id": id }))
            }
            "session.list" => {
                let sessions = self.client.list_sessions().await?;
                Reply::new("session.list", sessions)
            }
            "session.select" => {
                let payload: SessionPayload = parse_payload(command.payload)?;
                let id = payload.id.trim();
                if id.is_empty() {
                    bail!("session.select requires an id");
                }
                self.session_id = Some(id.to_string());
                Reply::new("session.selected", json!({ "id": id }))
            }
            "session.resolve" => {
                let payload: SessionPayload = parse_payload(command.payload)?;
                let request = match payload.id.trim() {
                    "" => self.session.request().to_string(),
                    id => id.to_string(),
                };
                let resolver = Resolver::new(&self.client, &self.session)?;
                let id = resolver.resolve(&request).await?;
                info!(request = %request, session_id = %id, "resolved session");
                self.session_id = Some(id.clone());
                Reply::new("session.resolved", json!({ "id": id, "request": request }))
            }
            "prompt" => {
                let payload: PromptPayload = parse_payload(command.payload)?;
                let session_id = self.session_id.clone().context("no session selected")?;
                let text = payload.text.trim();
                if text.is_empty() {
                    bail!("prompt requires text");
                }
                let options = self.prompt_options(payload.provider_id, payload.model_id);
                self.client.send_prompt(&session_id, text, &options).await?;
                Reply::new("prompt.sent", json!({ "session_id": session_id }))
            }
            "sse.start" => {
                if self.feed.is_some() {
                    bail!("event stream already started");
                }
                let feed = self
                    .client
                    .subscribe()
                    .await
                    .context("Failed to connect to the event feed")?;
                let cancel = interrupt::cancellation_token();
                let deltas = stream::spawn_stream(feed, cancel.clone());
                self.feed = Some(Feed { deltas, cancel });
                info!("event stream started");
                Reply::new("sse.started", Value::Null)
            }
            "sse.stop" => {
                self.stop_feed();
                Reply::new("sse.stopped", Value::Null)
            }
            other => bail!("unknown command: {other}"),
        }
    }

    /// Config defaults with the per-prompt provider/model applied on top.
    fn prompt_options(&self, provider_id: Option<String>, model_id: Option<String>) -> PromptOptions {
        let mut defaults = self.defaults.clone();
        if provider_id.is_some() {
            defaults.provider_id = provider_id;
        }
        if model_id.is_some() {
            defaults.model_id = model_id;
        }
        PromptOptions::from_defaults(&defaults)
    }

    async fn handle_stream_item(&mut self, item: Option<ClientResult<StreamDelta>>) -> Result<()> {
        match item {
            Some(Ok(delta)) => self.emit(&Reply::new("delta", delta)?).await,
            Some(Err(err)) => {
                self.stop_feed();
                self.emit_error(&format!("Event stream failed: {err}")).await
            }
            None => {
                self.stop_feed();
                self.emit(&Reply::new("sse.stopped", json!({ "reason": "closed" }))?)
                    .await
            }
        }
    }

    fn stop_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.cancel.cancel();
            info!("event stream stopped");
        }
    }

    async fn emit_error(&mut self, message: &str) -> Result<()> {
        self.emit(&Reply::new("error", json!({ "message": message }))?)
            .await
    }

    async fn emit(&mut self, reply: &Reply) -> Result<()> {
        let mut line = serde_json::to_string(reply)?;
        line.push('\n');
        self.out
            .write_all(line.as_bytes())
            .await
            .context("write headless output")?;
        self.out.flush().await.context("write headless output")?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Waits for the next delta, or forever when no stream is open.
async fn next_delta(feed: Option<&mut Feed>) -> Option<ClientResult<StreamDelta>> {
    match feed {
        Some(feed) => feed.deltas.recv().await,
        None => std::future::pending().await,
    }
}

/// Parses a command payload; a missing payload yields the default.
fn parse_payload<T: DeserializeOwned + Default>(value: Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).context("invalid payload")
}
