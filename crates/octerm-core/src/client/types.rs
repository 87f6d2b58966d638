//! Wire types for the agent server's catalog endpoints.

use serde::{Deserialize, Serialize};

use crate::config::DefaultsConfig;

/// A session as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Token counts attached to a message. Missing fields count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.reasoning)
    }
}

/// Message id plus token usage, the only message data the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: String,
    pub tokens: TokenUsage,
}

/// Message list entries come either flat or wrapped in `{info, parts}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessageEntry {
    Wrapped { info: MessageInfo },
    Flat(MessageInfo),
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageInfo {
    id: String,
    #[serde(default)]
    tokens: Option<TokenUsage>,
}

impl From<MessageEntry> for MessageSummary {
    fn from(entry: MessageEntry) -> Self {
        let (MessageEntry::Wrapped { info } | MessageEntry::Flat(info)) = entry;
        Self {
            id: info.id,
            tokens: info.tokens.unwrap_or_default(),
        }
    }
}

/// Provider/model pair sent with a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRef {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
}

/// Optional routing sent alongside prompt text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptOptions {
    pub model: Option<ModelRef>,
    pub agent: Option<String>,
}

impl PromptOptions {
    /// Builds options from the `[defaults]` section.
    ///
    /// A model reference is produced when either the provider or the model is set.
    pub fn from_defaults(defaults: &DefaultsConfig) -> Self {
        let provider = non_empty(defaults.provider_id.as_deref());
        let model = non_empty(defaults.model_id.as_deref());
        let model = if provider.is_some() || model.is_some() {
            Some(ModelRef {
                provider_id: provider.unwrap_or_default().to_string(),
                model_id: model.unwrap_or_default().to_string(),
            })
        } else {
            None
        };

        Self {
            model,
            agent: non_empty(defaults.agent.as_deref()).map(str::to_string),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub(crate) struct PromptRequest<'a> {
    pub parts: Vec<PromptPart<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a ModelRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PromptPart<'a> {
    #[serde(rename = "type")]
    pub part_type: &'static str,
    pub text: &'a str,
}

impl<'a> PromptRequest<'a> {
    pub fn text(text: &'a str, options: &'a PromptOptions) -> Self {
        Self {
            parts: vec![PromptPart {
                part_type: "text",
                text,
            }],
            model: options.model.as_ref(),
            agent: options.agent.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionResponse {
    pub id: String,
}
