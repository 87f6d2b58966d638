use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::{ContentDelta, MessageMeta, Operation, StreamDelta};
use crate::feed::{self, FeedRecord, MessageUpdate, PartUpdate, RawEvent, Role};

/// Turns feed records into deduplicated deltas.
///
/// State is keyed by message and fragment id and lives as long as one stream;
/// a new stream starts from a fresh `Reconciler`.
#[derive(Debug, Default)]
pub struct Reconciler {
    role_of: HashMap<String, Role>,
    /// Last emitted completion flag per assistant message.
    meta_of: HashMap<String, bool>,
    /// Full text of each fragment as already delivered downstream.
    last_text: HashMap<String, String>,
    /// Fragments whose final delta has been delivered.
    finished: HashSet<String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and reconciles one raw event. Ill-formed events are logged and dropped.
    pub fn process(&mut self, raw: &RawEvent) -> Option<StreamDelta> {
        match feed::decode(raw) {
            Ok(record) => self.reconcile(record),
            Err(err) => {
                warn!(error = %err, event = %raw.event, "dropping ill-formed feed record");
                None
            }
        }
    }

    /// Applies one record to the reconciler state and returns the delta it produces, if any.
    pub fn reconcile(&mut self, record: FeedRecord) -> Option<StreamDelta> {
        match record {
            FeedRecord::MessageUpdated(update) => self.on_message(update),
            FeedRecord::PartUpdated(part) => self.on_part(part).map(StreamDelta::Content),
            FeedRecord::Other(record_type) => {
                debug!(record_type, "ignoring feed record");
                None
            }
        }
    }

    fn on_message(&mut self, update: MessageUpdate) -> Option<StreamDelta> {
        debug!(message_id = %update.id, role = ?update.role, "message updated");
        self.role_of.insert(update.id.clone(), update.role);

        if update.role != Role::Assistant {
            return None;
        }
        if self.meta_of.get(&update.id) == Some(&update.completed) {
            return None;
        }
        self.meta_of.insert(update.id.clone(), update.completed);

        Some(StreamDelta::Meta(MessageMeta {
            message_id: update.id,
            complete: update.completed,
        }))
    }

    fn on_part(&mut self, part: PartUpdate) -> Option<ContentDelta> {
        if self.role_of.get(&part.message_id) == Some(&Role::User) {
            debug!(message_id = %part.message_id, fragment_id = %part.id, "skipping user fragment");
            return None;
        }

        let previous = self.last_text.get(&part.id).map_or("", String::as_str);
        let (op, text, next_text) = match part.delta {
            Some(delta) => {
                let next = format!("{previous}{delta}");
                (Operation::Append, delta, next)
            }
            // An empty snapshot never clears delivered text.
            None if part.text.is_empty() || part.text == previous => {
                (Operation::Append, String::new(), previous.to_string())
            }
            None if part.text.starts_with(previous) => {
                let suffix = part.text[previous.len()..].to_string();
                (Operation::Append, suffix, part.text)
            }
            // Not a continuation of what was delivered: last Replace wins.
            None => (Operation::Replace, part.text.clone(), part.text),
        };

        let completion_only =
            text.is_empty() && part.completed && !self.finished.contains(&part.id);
        if text.is_empty() && !completion_only {
            return None;
        }

        if part.completed {
            self.finished.insert(part.id.clone());
        }
        self.last_text.insert(part.id.clone(), next_text);

        Some(ContentDelta {
            message_id: part.message_id,
            fragment_id: part.id,
            kind: part.kind,
            op,
            text,
            is_final: part.completed,
        })
    }
}
