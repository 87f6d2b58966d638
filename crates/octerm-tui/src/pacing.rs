//! Typewriter pacing for answer text.
//!
//! Answer text is offered in whatever bursts the network delivers and drained
//! a few characters per tick. One fragment owns the backlog at a time; offering
//! text for another fragment first flushes the current backlog in full.

/// Text released from the backlog, addressed to its fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub text: String,
    pub fragment_id: String,
    pub message_id: String,
    /// Backlog left after this reveal.
    pub remaining: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    fragment_id: String,
    message_id: String,
}

#[derive(Debug, Default)]
pub struct PacingBuffer {
    owner: Option<Owner>,
    backlog: String,
}

impl PacingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Queues `text` for `fragment_id`.
    ///
    /// Returns the previous owner's whole backlog when ownership changes, which
    /// must be applied before anything revealed for the new owner.
    pub fn offer(&mut self, fragment_id: &str, message_id: &str, text: &str) -> Option<Reveal> {
        let same_owner = self
            .owner
            .as_ref()
            .is_some_and(|o| o.fragment_id == fragment_id && o.message_id == message_id);

        let flushed = if same_owner { None } else { self.flush() };
        if !same_owner {
            self.owner = Some(Owner {
                fragment_id: fragment_id.to_string(),
                message_id: message_id.to_string(),
            });
        }
        self.backlog.push_str(text);
        flushed
    }

    /// Releases up to `max_chars` characters from the front of the backlog.
    pub fn drain(&mut self, max_chars: usize) -> Option<Reveal> {
        if self.backlog.is_empty() {
            return None;
        }
        let owner = self.owner.as_ref()?;

        let end = self
            .backlog
            .char_indices()
            .nth(max_chars.max(1))
            .map_or(self.backlog.len(), |(index, _)| index);
        let text: String = self.backlog.drain(..end).collect();

        Some(Reveal {
            text,
            fragment_id: owner.fragment_id.clone(),
            message_id: owner.message_id.clone(),
            remaining: !self.backlog.is_empty(),
        })
    }

    /// Releases the whole backlog at once.
    pub fn flush(&mut self) -> Option<Reveal> {
        if self.backlog.is_empty() {
            return None;
        }
        let owner = self.owner.as_ref()?;

        Some(Reveal {
            text: std::mem::take(&mut self.backlog),
            fragment_id: owner.fragment_id.clone(),
            message_id: owner.message_id.clone(),
            remaining: false,
        })
    }
}
