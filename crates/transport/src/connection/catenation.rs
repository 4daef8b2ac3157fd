use std::fmt;

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info};

use crate::codec::ResponseEncoder;
use crate::protocol::body::{ReqBody, ResponseBody};
use crate::protocol::{HttpError, Message, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

/// Identifies one request/response exchange on a connection.
///
/// Ids are handed out in arrival order, so comparing two ids of the same
/// connection tells which request came first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A framed response ready for the wire.
#[derive(Debug)]
pub struct Exchange {
    pub head: ResponseHead,
    pub payload_size: PayloadSize,
    pub body: ResponseBody,
    /// The connection ends once this exchange has been written.
    pub close: bool,
}

/// The output side of one request: a slot reserved on the connection at
/// admission time, filled exactly once by [`OutputPort::connect`].
#[derive(Debug)]
pub struct OutputPort {
    channel_id: ChannelId,
    sender: oneshot::Sender<Exchange>,
}

impl OutputPort {
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Publishes the response into this request's slot.
    ///
    /// The bytes reach the wire after every response admitted before this
    /// one, whenever those are connected.
    pub fn connect(self, exchange: Exchange) -> Result<(), SendError> {
        let channel_id = self.channel_id;
        self.sender.send(exchange).map_err(|_exchange| SendError::Disconnected { channel_id })
    }
}

/// An admitted request as handed to the routing layer.
#[derive(Debug)]
pub struct RequestDescriptor {
    channel_id: ChannelId,
    header: RequestHeader,
    body: ReqBody,
    is_final: bool,
}

impl RequestDescriptor {
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    /// Whether the connection closes after this exchange.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn into_parts(self) -> (ChannelId, RequestHeader, ReqBody, bool) {
        (self.channel_id, self.header, self.body, self.is_final)
    }
}

/// One batch of pipelined requests: `(output port, descriptor)` pairs in arrival order.
pub type Pipeline = Vec<(OutputPort, RequestDescriptor)>;

struct Slot {
    channel_id: ChannelId,
    receiver: oneshot::Receiver<Exchange>,
}

/// Admission side of a connection.
#[derive(Debug)]
pub struct Pipeliner {
    next_id: u64,
    slots: mpsc::UnboundedSender<Slot>,
}

/// Output side of a connection: writes responses in admission order.
pub struct Catenation {
    slots: mpsc::UnboundedReceiver<Slot>,
}

impl fmt::Debug for Catenation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catenation").finish_non_exhaustive()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("channel_id", &self.channel_id).finish_non_exhaustive()
    }
}

/// Creates the admission and output halves of one connection.
pub fn pipeline() -> (Pipeliner, Catenation) {
    let (slots_sender, slots_receiver) = mpsc::unbounded();
    (Pipeliner { next_id: 1, slots: slots_sender }, Catenation { slots: slots_receiver })
}

impl Pipeliner {
    /// Admits the next request of the connection, reserving its output slot.
    pub fn admit(&mut self, header: RequestHeader, body: ReqBody) -> (OutputPort, RequestDescriptor) {
        let channel_id = ChannelId(self.next_id);
        self.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        if self.slots.unbounded_send(Slot { channel_id, receiver }).is_err() {
            // the port will report the disconnect when it is used
            debug!(%channel_id, "admitting request on a closed connection");
        }

        let is_final = header.wants_close();
        (OutputPort { channel_id, sender }, RequestDescriptor { channel_id, header, body, is_final })
    }

    /// Admits a whole batch.
    pub fn admit_all<I>(&mut self, requests: I) -> Pipeline
    where
        I: IntoIterator<Item = (RequestHeader, ReqBody)>,
    {
        requests.into_iter().map(|(header, body)| self.admit(header, body)).collect()
    }
}

impl Catenation {
    /// Drives the connection output until the pipeliner is dropped and every
    /// slot is written, or until an exchange asks for the connection to close.
    pub async fn run<W>(mut self, writer: W) -> Result<(), HttpError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut framed_write = FramedWrite::new(writer, ResponseEncoder::new());

        while let Some(Slot { channel_id, receiver }) = self.slots.next().await {
            let Ok(exchange) = receiver.await else {
                error!(%channel_id, "output channel dropped without a response, closing connection");
                let _ = SinkExt::<OutMessage>::close(&mut framed_write).await;
                return Err(SendError::Abandoned { channel_id }.into());
            };

            let close = exchange.close;
            write_exchange(&mut framed_write, exchange).await?;
            debug!(%channel_id, close, "response written");

            if close {
                SinkExt::<OutMessage>::close(&mut framed_write).await?;
                info!(%channel_id, "final response written, connection shutdown");
                return Ok(());
            }
        }

        SinkExt::<OutMessage>::flush(&mut framed_write).await?;
        Ok(())
    }
}

type Framed<W> = FramedWrite<W, ResponseEncoder>;
type OutMessage = Message<(ResponseHead, PayloadSize), Bytes>;

async fn write_exchange<W>(framed_write: &mut Framed<W>, exchange: Exchange) -> Result<(), HttpError>
where
    W: AsyncWrite + Unpin,
{
    let Exchange { head, payload_size, mut body, .. } = exchange;

    framed_write.feed(OutMessage::Header((head, payload_size))).await?;

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                // trailers are not forwarded
                let Ok(data) = frame.into_data() else { continue };
                framed_write.feed(OutMessage::Payload(PayloadItem::Chunk(data))).await?;
            }
            Some(Err(e)) => {
                error!(cause = %e, "response body failed");
                return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into());
            }
            None => {
                framed_write.send(OutMessage::Payload(PayloadItem::Eof)).await?;
                return Ok(());
            }
        }
    }
}
