//! Streamed stdout rendering for single-shot exec mode.
//!
//! This module provides:
//! - `ExecRenderer` for reconciled stream deltas
//! - `run_exec` for single-shot exec mode

use std::collections::HashMap;
use std::io::{Write, stdout};

use anyhow::{Context, Result};
use octerm_core::client::{HttpClient, PromptOptions};
use octerm_core::interrupt::{self, InterruptedError};
use octerm_core::stream::{self, ContentDelta, ContentKind, MessageMeta, Operation, StreamDelta};
use tracing::{debug, info};

/// Options for exec execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub show_thinking: bool,
    pub show_tools: bool,
    /// Routing sent with the prompt.
    pub prompt: PromptOptions,
}

/// Sends a prompt and streams the assistant's reply to stdout.
///
/// The feed is connected before the prompt is sent so no early deltas are
/// missed. Returns when the reply completes or the feed closes.
pub async fn run_exec(
    client: &HttpClient,
    session_id: &str,
    prompt: &str,
    options: &ExecOptions,
) -> Result<()> {
    let feed = client
        .subscribe()
        .await
        .context("Failed to connect to the event feed")?;
    let cancel = interrupt::cancellation_token();
    let _stop_stream = cancel.clone().drop_guard();
    let mut deltas = stream::spawn_stream(feed, cancel);

    client
        .send_prompt(session_id, prompt, &options.prompt)
        .await
        .context("Failed to send prompt")?;
    debug!(session_id, "prompt sent, waiting for reply");

    let mut renderer = ExecRenderer::new(stdout(), options);
    while let Some(item) = deltas.recv().await {
        let delta = item.context("Event stream failed")?;
        if renderer.handle_delta(delta) {
            info!(session_id, "reply complete");
            break;
        }
    }
    renderer.finish();

    if interrupt::is_interrupted() {
        return Err(InterruptedError.into());
    }
    Ok(())
}

/// Writes the reply to one prompt as plain text.
///
/// # Output contract
/// - The first assistant message seen after the prompt is the reply; deltas
///   for any other message are ignored.
/// - Answer fragments are always written; reasoning and tool fragments only
///   when enabled, each introduced by a bracketed label.
/// - A replaced fragment is written again in full on a fresh line.
pub struct ExecRenderer<W: Write> {
    out: W,
    show_thinking: bool,
    show_tools: bool,
    /// Message being rendered, bound on its first delta.
    reply_id: Option<String>,
    /// Fragment id -> text already written.
    written: HashMap<String, String>,
    last_fragment: Option<String>,
    /// Whether the final newline has been printed after the last output.
    needs_final_newline: bool,
}

impl<W: Write> ExecRenderer<W> {
    pub fn new(out: W, options: &ExecOptions) -> Self {
        Self {
            out,
            show_thinking: options.show_thinking,
            show_tools: options.show_tools,
            reply_id: None,
            written: HashMap::new(),
            last_fragment: None,
            needs_final_newline: false,
        }
    }

    /// Handles one delta. Returns true once the reply is complete.
    pub fn handle_delta(&mut self, delta: StreamDelta) -> bool {
        match delta {
            StreamDelta::Meta(meta) => self.handle_meta(&meta),
            StreamDelta::Content(content) => {
                if self.binds(&content.message_id) {
                    self.write_content(content);
                }
                false
            }
        }
    }

    /// Ends the output with a newline if needed.
    pub fn finish(&mut self) {
        if self.needs_final_newline {
            let _ = writeln!(self.out);
            self.needs_final_newline = false;
        }
        let _ = self.out.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn handle_meta(&mut self, meta: &MessageMeta) -> bool {
        match self.reply_id.as_deref() {
            Some(id) => id == meta.message_id && meta.complete,
            // A completed message announced before ours is history, not the reply
            None if meta.complete => false,
            None => {
                self.reply_id = Some(meta.message_id.clone());
                false
            }
        }
    }

    fn binds(&mut self, message_id: &str) -> bool {
        match self.reply_id.as_deref() {
            Some(id) => id == message_id,
            None => {
                self.reply_id = Some(message_id.to_string());
                true
            }
        }
    }

    fn label(&self, kind: ContentKind) -> Option<Option<&'static str>> {
        match kind {
            ContentKind::Answer => Some(None),
            ContentKind::Reasoning if self.show_thinking => Some(Some("[thinking] ")),
            ContentKind::Tool if self.show_tools => Some(Some("[tool] ")),
            ContentKind::Reasoning | ContentKind::Tool | ContentKind::Other => None,
        }
    }

    fn write_content(&mut self, delta: ContentDelta) {
        let Some(label) = self.label(delta.kind) else {
            return;
        };
        if delta.text.is_empty() {
            return;
        }

        let mid_line = self.needs_final_newline;
        let switched = self.last_fragment.as_deref() != Some(delta.fragment_id.as_str());
        let written = self.written.entry(delta.fragment_id.clone()).or_default();

        let mut chunk = String::new();
        match delta.op {
            Operation::Append => written.push_str(&delta.text),
            Operation::Replace => {
                if !written.is_empty() && mid_line {
                    chunk.push('\n');
                }
                written.clone_from(&delta.text);
            }
        }

        if switched {
            if mid_line && chunk.is_empty() {
                chunk.push('\n');
            }
            if let Some(label) = label {
                chunk.push_str(label);
            }
        }
        chunk.push_str(&delta.text);

        let _ = write!(self.out, "{chunk}");
        let _ = self.out.flush();
        self.needs_final_newline = !chunk.ends_with('\n');
        self.last_fragment = Some(delta.fragment_id);
    }
}
