use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use http_body::{Body, Frame, SizeHint};

use crate::protocol::{ParseError, PayloadItem, PayloadSize};

type Item = Result<PayloadItem, ParseError>;

/// The entity body of one inbound request, as delivered by the transport.
///
/// The producing side is a [`ReqBodySender`]; the transport pushes chunks into
/// it as they come off the connection, and whoever accepts the request body
/// drains this end through the `http_body::Body` interface. Dropping a
/// `ReqBody` discards whatever the sender still has to deliver.
#[derive(Debug)]
pub struct ReqBody {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Empty,
    Channel { receiver: mpsc::Receiver<Item>, payload_size: PayloadSize, eof: bool },
}

/// Producer side of a [`ReqBody`].
#[derive(Debug)]
pub struct ReqBodySender {
    sender: mpsc::Sender<Item>,
}

impl ReqBody {
    /// A body that is already complete, for requests that carry none.
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// Creates a connected producer/consumer pair for a body of the given size.
    pub fn channel(payload_size: PayloadSize) -> (ReqBodySender, ReqBody) {
        let (sender, receiver) = mpsc::channel(8);
        (ReqBodySender { sender }, ReqBody { kind: Kind::Channel { receiver, payload_size, eof: false } })
    }

    /// A complete in-memory body, mostly useful when the transport already
    /// buffered the request.
    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }

        let (mut sender, receiver) = mpsc::channel(2);
        let length = bytes.len() as u64;
        // capacity covers both items, so neither send can fail
        let _ = sender.try_send(Ok(PayloadItem::Chunk(bytes)));
        let _ = sender.try_send(Ok(PayloadItem::Eof));
        ReqBody { kind: Kind::Channel { receiver, payload_size: PayloadSize::Length(length), eof: false } }
    }
}

impl ReqBodySender {
    /// Delivers one chunk; fails once the consumer has gone away.
    pub async fn send(&mut self, bytes: Bytes) -> Result<(), ParseError> {
        self.sender
            .send(Ok(PayloadItem::Chunk(bytes)))
            .await
            .map_err(|e| ParseError::invalid_body(format!("request body receiver dropped: {e}")))
    }

    /// Marks the end of the body.
    pub async fn finish(mut self) -> Result<(), ParseError> {
        self.sender
            .send(Ok(PayloadItem::Eof))
            .await
            .map_err(|e| ParseError::invalid_body(format!("request body receiver dropped: {e}")))
    }

    /// Terminates the body with an error seen on the connection.
    pub async fn abort(mut self, error: ParseError) {
        let _ = self.sender.send(Err(error)).await;
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let Kind::Channel { receiver, eof, .. } = &mut self.get_mut().kind else {
            return Poll::Ready(None);
        };

        if *eof {
            return Poll::Ready(None);
        }

        match ready!(receiver.poll_next_unpin(cx)) {
            Some(Ok(PayloadItem::Chunk(bytes))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Ok(PayloadItem::Eof)) => {
                *eof = true;
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                *eof = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                *eof = true;
                Poll::Ready(Some(Err(ParseError::invalid_body("request body ended before its end marker"))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Channel { eof, .. } => *eof,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Channel { payload_size, .. } => (*payload_size).into(),
        }
    }
}

impl From<PayloadSize> for SizeHint {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}

impl From<SizeHint> for PayloadSize {
    fn from(size_hint: SizeHint) -> Self {
        match size_hint.exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn streams_chunks_until_eof() {
        let (mut sender, body) = ReqBody::channel(PayloadSize::Chunked);

        tokio::spawn(async move {
            sender.send(Bytes::from_static(b"hello ")).await.unwrap();
            sender.send(Bytes::from_static(b"world")).await.unwrap();
            sender.finish().await.unwrap();
        });

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn missing_end_marker_is_an_error() {
        let (mut sender, body) = ReqBody::channel(PayloadSize::Length(5));
        sender.send(Bytes::from_static(b"hel")).await.unwrap();
        drop(sender);

        assert!(matches!(body.collect().await, Err(ParseError::InvalidBody { .. })));
    }

    #[tokio::test]
    async fn sender_notices_dropped_receiver() {
        let (mut sender, body) = ReqBody::channel(PayloadSize::Chunked);
        drop(body);

        assert!(sender.send(Bytes::from_static(b"lost")).await.is_err());
    }

    #[tokio::test]
    async fn once_and_empty() {
        let body = ReqBody::once(Bytes::from_static(b"abc"));
        assert_eq!(body.size_hint().exact(), Some(3));
        assert_eq!(body.collect().await.unwrap().to_bytes(), Bytes::from_static(b"abc"));

        let body = ReqBody::empty();
        assert!(body.is_end_stream());
        assert!(body.collect().await.unwrap().to_bytes().is_empty());
    }
}
