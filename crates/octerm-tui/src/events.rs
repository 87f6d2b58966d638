//! UI event types.
//!
//! All external inputs (terminal, stream deltas, async results) are converted
//! to `UiEvent` before being processed by the reducer.

use crossterm::event::Event as CrosstermEvent;
use octerm_core::client::ClientError;
use octerm_core::stream::StreamDelta;

#[derive(Debug)]
pub enum UiEvent {
    /// Periodic tick for the spinner and redraws.
    Tick,

    /// Typewriter tick: reveal the next chunk of paced text.
    Typewriter,

    /// Current terminal size, delivered before the other events of a frame.
    Frame { width: u16, height: u16 },

    /// Raw terminal input.
    Terminal(CrosstermEvent),

    /// Reconciled delta from the event feed.
    Stream(StreamDelta),

    /// The event feed failed; no more deltas will arrive.
    StreamFailed(ClientError),

    /// The event feed ended without an error.
    StreamClosed,

    /// The server accepted a prompt.
    PromptSent,

    /// Submitting a prompt failed.
    PromptFailed(String),
}
