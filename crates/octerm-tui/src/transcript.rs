//! Conversation transcript.
//!
//! Messages live in an arena (`Vec<Message>`) in creation order. Assistant
//! messages are also indexed by server id, and `trailing_assistant` points at
//! the assistant message that deltas without a known id are attached to.
//!
//! Invariants:
//! - a message leaves `pending` exactly once, on the first non-empty text it
//!   receives, and never returns to it;
//! - messages are never removed;
//! - fragments keep arrival order within their message.

use std::collections::HashMap;
use std::fmt::Write as _;

use octerm_core::stream::{ContentDelta, ContentKind, MessageMeta, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: String,
    pub kind: ContentKind,
    pub text: String,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server id; unknown until the first meta or delta for the message arrives.
    pub id: Option<String>,
    pub role: Role,
    pub pending: bool,
    pub complete: bool,
    /// Client-side notice (errors, stream state) rather than agent output.
    pub notice: bool,
    pub fragments: Vec<Fragment>,
}

impl Message {
    fn user(text: &str) -> Self {
        Self {
            id: None,
            role: Role::User,
            pending: false,
            complete: true,
            notice: false,
            fragments: vec![Fragment {
                id: String::new(),
                kind: ContentKind::Answer,
                text: text.to_string(),
                complete: true,
            }],
        }
    }

    fn pending_assistant(id: Option<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            pending: true,
            complete: false,
            notice: false,
            fragments: Vec::new(),
        }
    }

    fn fragment_mut(&mut self, id: &str, kind: ContentKind) -> &mut Fragment {
        let index = match self.fragments.iter().position(|f| f.id == id) {
            Some(index) => index,
            None => {
                self.fragments.push(Fragment {
                    id: id.to_string(),
                    kind,
                    text: String::new(),
                    complete: false,
                });
                self.fragments.len() - 1
            }
        };
        &mut self.fragments[index]
    }
}

/// Which fragment kinds are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderFilter {
    pub show_reasoning: bool,
    pub show_tools: bool,
}

impl RenderFilter {
    pub fn allows(self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Reasoning => self.show_reasoning,
            ContentKind::Tool => self.show_tools,
            ContentKind::Answer | ContentKind::Other => true,
        }
    }
}

impl Default for RenderFilter {
    fn default() -> Self {
        Self {
            show_reasoning: true,
            show_tools: true,
        }
    }
}

/// Render-ready snapshot of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// One message as presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub role: Role,
    /// Show the waiting spinner.
    pub pending: bool,
    pub notice: bool,
    pub fragments: Vec<BlockFragment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFragment {
    pub kind: ContentKind,
    pub text: String,
}

impl Document {
    /// Deterministic plain-text rendering.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match block.role {
                Role::User => {
                    let text: String = block.fragments.iter().map(|f| f.text.as_str()).collect();
                    let _ = writeln!(out, "You: {text}");
                }
                Role::Assistant if block.notice => {
                    for fragment in &block.fragments {
                        let _ = writeln!(out, "{}", fragment.text);
                    }
                }
                Role::Assistant => {
                    if block.pending {
                        out.push_str("Assistant: ...\n");
                        continue;
                    }
                    out.push_str("Assistant:\n");
                    for fragment in &block.fragments {
                        let label = match fragment.kind {
                            ContentKind::Reasoning => "[thinking] ",
                            ContentKind::Tool => "[tool] ",
                            ContentKind::Answer | ContentKind::Other => "",
                        };
                        let _ = writeln!(out, "{label}{}", fragment.text);
                    }
                }
            }
        }
        out
    }
}

/// Ordered log of messages fed by stream deltas.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    by_id: HashMap<String, usize>,
    trailing_assistant: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a user message holding `text`.
    pub fn add_user_message(&mut self, text: &str) {
        self.messages.push(Message::user(text));
        self.trailing_assistant = None;
    }

    /// Returns the trailing assistant placeholder, creating one if needed.
    pub fn ensure_pending_assistant(&mut self) -> usize {
        if let Some(index) = self.trailing_assistant
            && self.messages[index].pending
            && self.messages[index].id.is_none()
        {
            return index;
        }
        self.push_assistant(None)
    }

    /// Appends a client-side notice shown as an assistant line.
    pub fn add_system_line(&mut self, text: &str) {
        self.messages.push(Message {
            id: None,
            role: Role::Assistant,
            pending: false,
            complete: true,
            notice: true,
            fragments: vec![Fragment {
                id: String::new(),
                kind: ContentKind::Other,
                text: text.to_string(),
                complete: true,
            }],
        });
    }

    /// Applies a reconciled content delta.
    pub fn apply_delta(&mut self, delta: &ContentDelta) {
        let index = self.locate(&delta.message_id);
        let message = &mut self.messages[index];

        let fragment = message.fragment_mut(&delta.fragment_id, delta.kind);
        match delta.op {
            Operation::Append => fragment.text.push_str(&delta.text),
            Operation::Replace => fragment.text.clone_from(&delta.text),
        }
        if delta.is_final {
            fragment.complete = true;
        }

        if !delta.text.is_empty() {
            message.pending = false;
        }
    }

    /// Applies message-level state.
    pub fn apply_meta(&mut self, meta: &MessageMeta) {
        let index = self.locate(&meta.message_id);
        if meta.complete {
            self.messages[index].complete = true;
        }
    }

    /// Marks the trailing placeholder as done without content (e.g. the prompt failed).
    pub fn settle_trailing(&mut self) {
        if let Some(index) = self.trailing_assistant.take() {
            self.messages[index].complete = true;
        }
    }

    /// True when `message_id` is the message the current prompt is answered in.
    pub fn is_trailing(&self, message_id: &str) -> bool {
        self.trailing_assistant
            .is_some_and(|index| self.messages[index].id.as_deref() == Some(message_id))
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.by_id.get(message_id).map(|&index| &self.messages[index])
    }

    /// Whether any assistant message still waits for its first content.
    pub fn has_pending(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.pending && !m.complete)
    }

    /// Builds the render document. Pure: same state, same output.
    pub fn render(&self, filter: RenderFilter) -> Document {
        let blocks = self
            .messages
            .iter()
            .map(|message| Block {
                role: message.role,
                pending: message.pending && !message.complete,
                notice: message.notice,
                fragments: message
                    .fragments
                    .iter()
                    .filter(|f| filter.allows(f.kind) && !f.text.is_empty())
                    .map(|f| BlockFragment {
                        kind: f.kind,
                        text: f.text.clone(),
                    })
                    .collect(),
            })
            .collect();
        Document { blocks }
    }

    /// Finds the message for `message_id`: a known id, else the unbound
    /// trailing placeholder, else a new pending assistant message.
    fn locate(&mut self, message_id: &str) -> usize {
        if let Some(&index) = self.by_id.get(message_id) {
            return index;
        }

        if let Some(index) = self.trailing_assistant
            && self.messages[index].id.is_none()
        {
            self.messages[index].id = Some(message_id.to_string());
            self.by_id.insert(message_id.to_string(), index);
            return index;
        }

        self.push_assistant(Some(message_id.to_string()))
    }

    fn push_assistant(&mut self, id: Option<String>) -> usize {
        let index = self.messages.len();
        if let Some(id) = &id {
            self.by_id.insert(id.clone(), index);
        }
        self.messages.push(Message::pending_assistant(id));
        self.trailing_assistant = Some(index);
        index
    }
}
