//! Reconciled content stream.
//!
//! [`spawn_stream`] runs two tasks connected by bounded queues:
//!
//! ```text
//! event feed -> producer -> raw queue (32) -> reconciler -> delta queue (64) -> consumer
//! ```
//!
//! The consumer receives [`StreamDelta`]s in feed order. A transport failure is
//! delivered as exactly one `Err`, after which the channel closes. A clean end
//! of the feed closes the channel without an error.

mod reconciler;

pub use reconciler::Reconciler;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ClientResult;
use crate::feed::{EventFeed, RawEvent};

/// Capacity of the queue between the feed reader and the reconciler.
pub const RAW_QUEUE_CAPACITY: usize = 32;
/// Capacity of the queue between the reconciler and the consumer.
pub const DELTA_QUEUE_CAPACITY: usize = 64;

/// Presentation class of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Assistant prose.
    Answer,
    Reasoning,
    Tool,
    Other,
}

impl ContentKind {
    /// Maps a server fragment type onto a content kind.
    pub fn from_part_type(part_type: &str) -> Self {
        match part_type {
            "text" => ContentKind::Answer,
            "reasoning" | "thinking" => ContentKind::Reasoning,
            "tool" | "tool-use" | "function" => ContentKind::Tool,
            _ => ContentKind::Other,
        }
    }
}

/// How a delta's text combines with the fragment's current text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Append,
    Replace,
}

/// A deduplicated change to one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDelta {
    pub message_id: String,
    pub fragment_id: String,
    pub kind: ContentKind,
    pub op: Operation,
    pub text: String,
    pub is_final: bool,
}

/// Message-level state for an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageMeta {
    pub message_id: String,
    pub complete: bool,
}

/// Item delivered to the stream consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamDelta {
    Meta(MessageMeta),
    Content(ContentDelta),
}

impl StreamDelta {
    pub fn message_id(&self) -> &str {
        match self {
            StreamDelta::Meta(meta) => &meta.message_id,
            StreamDelta::Content(delta) => &delta.message_id,
        }
    }
}

/// Starts the producer and reconciler tasks for `feed`.
///
/// Cancelling `cancel` stops both tasks; the returned receiver then closes
/// without further items. Must be called from within a tokio runtime.
pub fn spawn_stream(
    feed: EventFeed,
    cancel: CancellationToken,
) -> mpsc::Receiver<ClientResult<StreamDelta>> {
    let (raw_tx, raw_rx) = mpsc::channel(RAW_QUEUE_CAPACITY);
    let (delta_tx, delta_rx) = mpsc::channel(DELTA_QUEUE_CAPACITY);

    tokio::spawn(produce(feed, raw_tx, cancel.clone()));
    tokio::spawn(reconcile(raw_rx, delta_tx, cancel));

    delta_rx
}

async fn produce(
    mut feed: EventFeed,
    tx: mpsc::Sender<ClientResult<RawEvent>>,
    cancel: CancellationToken,
) {
    use futures_util::StreamExt;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("feed reader cancelled");
                return;
            }
            next = feed.next() => next,
        };

        match next {
            Some(Ok(raw)) => {
                if !forward(&tx, Ok(raw), &cancel).await {
                    return;
                }
            }
            Some(Err(err)) => {
                warn!(error = %err, "event feed failed");
                forward(&tx, Err(err), &cancel).await;
                return;
            }
            None => {
                info!("event feed closed");
                return;
            }
        }
    }
}

async fn reconcile(
    mut rx: mpsc::Receiver<ClientResult<RawEvent>>,
    tx: mpsc::Sender<ClientResult<StreamDelta>>,
    cancel: CancellationToken,
) {
    let mut reconciler = Reconciler::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = rx.recv() => next,
        };

        match next {
            Some(Ok(raw)) => {
                if let Some(delta) = reconciler.process(&raw)
                    && !forward(&tx, Ok(delta), &cancel).await
                {
                    return;
                }
            }
            Some(Err(err)) => {
                forward(&tx, Err(err), &cancel).await;
                return;
            }
            None => return,
        }
    }
}

/// Sends `item` unless cancelled first. Returns false when the stream should stop.
async fn forward<T>(tx: &mpsc::Sender<T>, item: T, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
