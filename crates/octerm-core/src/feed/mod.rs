//! Server event feed: SSE framing and record decoding.
//!
//! The feed is a long-lived `text/event-stream` response. [`SseParser`]
//! frames it into [`RawEvent`]s; [`records::decode`] turns each event's JSON
//! payload into a [`FeedRecord`].

pub mod records;

use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use futures_util::stream::BoxStream;
pub use records::{FeedRecord, MessageUpdate, PartUpdate, Role, decode};

use crate::client::{ClientError, ClientResult};

/// One SSE event: the event name (`message` when unnamed) and its data lines joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: String,
    pub data: String,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// A live event feed. Yields raw events until the connection closes; a
/// transport error is yielded as a single `Err`.
pub type EventFeed = BoxStream<'static, ClientResult<RawEvent>>;

/// SSE parser that converts a byte stream into [`RawEvent`]s.
///
/// Handles CRLF line endings and multi-byte UTF-8 sequences split across chunks.
pub struct SseParser<S> {
    inner: EventStream<S>,
}

impl<S> SseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ClientResult<RawEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                Poll::Ready(Some(Ok(RawEvent::new(event.event, event.data))))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(ClientError::stream(format!(
                "Event feed error: {e}"
            ))))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
