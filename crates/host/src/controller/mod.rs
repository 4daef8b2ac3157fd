//! The per-request exchange object.
//!
//! A [`Controller`] is created for every admitted request and handed to the
//! routing layer. It owns the two directional hooks of the exchange: the
//! inbound request body and the output port reserved for the response.
//!
//! Each controller walks through one state machine:
//!
//! ```text
//! open ──set_response──▶ response-set ──connect──▶ connected
//!                                          │
//!                                          └──connect (final request)──▶ closed
//! ```
//!
//! Exactly one response is produced per request. Calling [`Controller::set_response`]
//! twice, connecting before a response is set, connecting twice, or accepting the
//! request body twice is a [`ProtocolViolation`]: the call fails, the error is
//! logged, and the controller is faulted for good. A faulted controller gives up
//! its output slot, so the transport closes the connection rather than write a
//! second status line.

mod input;
mod output;

use std::fmt;
use std::mem;

use bytes::Bytes;
use futures::channel::mpsc;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::BodyExt;
use micro_transport::connection::{ChannelId, Exchange, OutputPort, RequestDescriptor};
use micro_transport::protocol::body::{ReqBody, ResponseBody};
use micro_transport::protocol::{ParseError, PayloadSize, ReasonPhrase, forbids_body};
use mime::Mime;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{ControllerError, ProtocolViolation};
use crate::lifecycle::Lifecycle;
use crate::request::Request;

/// Receiving end for an accepted request body.
pub type InputSender = mpsc::Sender<Result<Bytes, ParseError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    ResponseSet,
    Connected,
    Closed,
}

#[derive(Debug)]
struct StatusLine {
    status: StatusCode,
    reason: ReasonPhrase,
    length: Option<u64>,
}

#[derive(Debug)]
enum Phase {
    Open,
    ResponseSet(StatusLine),
    Connected,
    Closed,
}

pub struct Controller {
    channel_id: ChannelId,
    request: Request,
    headers: HeaderMap,
    phase: Phase,
    faulted: bool,
    input: Option<ReqBody>,
    output: Option<OutputPort>,
    scope: Lifecycle,
}

impl Controller {
    /// Binds an admitted request to the scope its work runs in.
    pub fn new(output: OutputPort, descriptor: RequestDescriptor, scope: Lifecycle) -> Self {
        let (channel_id, header, body, is_final) = descriptor.into_parts();
        Self {
            channel_id,
            request: Request::new(header, is_final),
            headers: HeaderMap::new(),
            phase: Phase::Open,
            faulted: false,
            input: Some(body),
            output: Some(output),
            scope,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn state(&self) -> State {
        match self.phase {
            Phase::Open => State::Open,
            Phase::ResponseSet(_) => State::ResponseSet,
            Phase::Connected => State::Connected,
            Phase::Closed => State::Closed,
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Whether the request body has been accepted, discarded or taken.
    pub fn is_accepted(&self) -> bool {
        self.input.is_none()
    }

    /// The lifecycle of the partition this exchange was routed to.
    pub fn scope(&self) -> &Lifecycle {
        &self.scope
    }

    pub(crate) fn rebind(&mut self, scope: Lifecycle) {
        self.scope = scope;
    }

    /// Response headers accumulated so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn extend_headers<I>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (HeaderName, HeaderValue)>,
    {
        for (name, value) in headers {
            self.headers.append(name, value);
        }
    }

    /// Sets the status line and framing of the response.
    ///
    /// `length` of `None` selects chunked framing, a known length selects
    /// `Content-Length`. Statuses that cannot carry a body get neither.
    pub fn set_response(
        &mut self,
        status: StatusCode,
        description: impl Into<Bytes>,
        length: Option<u64>,
        content_type: Option<&Mime>,
    ) -> Result<(), ControllerError> {
        self.ensure_usable()?;
        if !matches!(self.phase, Phase::Open) {
            return Err(self.violate(ProtocolViolation::ResponseAlreadySet(self.channel_id)));
        }

        let reason = ReasonPhrase::try_new(description)?;
        if let Some(mime) = content_type {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_str(mime.as_ref())?);
        }

        if !forbids_body(status) {
            match length {
                Some(length) => {
                    self.headers.remove(TRANSFER_ENCODING);
                    self.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
                }
                None => {
                    self.headers.remove(CONTENT_LENGTH);
                    self.headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
                }
            }
        }

        debug!(channel_id = %self.channel_id, status = status.as_u16(), ?length, "response set");
        self.phase = Phase::ResponseSet(StatusLine { status, reason, length });
        Ok(())
    }

    /// Publishes the response onto this request's output slot.
    ///
    /// `None` connects an empty body. With a known length set, `None` sends the
    /// head only: `Content-Length` keeps the declared size and no payload
    /// follows. Otherwise a body must yield exactly the declared length, or the
    /// transport fails the connection. On the final request of a connection a
    /// `Connection: close` header is added and the transport shuts the
    /// connection down once the body has been written.
    pub fn connect(&mut self, body: Option<ResponseBody>) -> Result<(), ControllerError> {
        self.ensure_usable()?;
        let line = match mem::replace(&mut self.phase, Phase::Connected) {
            Phase::ResponseSet(line) => line,
            Phase::Open => {
                self.phase = Phase::Open;
                return Err(self.violate(ProtocolViolation::ConnectBeforeResponse(self.channel_id)));
            }
            phase @ (Phase::Connected | Phase::Closed) => {
                self.phase = phase;
                return Err(self.violate(ProtocolViolation::AlreadyConnected(self.channel_id)));
            }
        };

        let Some(port) = self.output.take() else {
            return Err(ProtocolViolation::Faulted(self.channel_id).into());
        };

        let close = self.request.is_final();
        if close {
            self.headers.insert(CONNECTION, HeaderValue::from_static("close"));
            self.phase = Phase::Closed;
        }

        let head_only = body.is_none() && line.length.is_some();
        let payload_size =
            if forbids_body(line.status) || head_only { PayloadSize::Empty } else { PayloadSize::from_length(line.length) };

        let mut head = Response::new(());
        *head.status_mut() = line.status;
        *head.version_mut() = Version::HTTP_11;
        *head.headers_mut() = mem::take(&mut self.headers);
        head.extensions_mut().insert(line.reason);

        let body = body.unwrap_or_else(ResponseBody::empty);
        port.connect(Exchange { head, payload_size, body, close })?;
        debug!(channel_id = %self.channel_id, close, "response connected");
        Ok(())
    }

    /// Connects the request body to `sink`, or discards it when `sink` is `None`.
    ///
    /// The body is pumped by a unit of work tracked in the controller's scope;
    /// it stops early once the scope is terminated.
    pub fn accept(&mut self, sink: Option<InputSender>) -> Result<(), ControllerError> {
        let body = self.take_input()?;
        if sink.is_none() && body.is_end_stream() {
            return Ok(());
        }

        let channel_id = self.channel_id;
        let cancelled = self.scope.cancelled();
        self.scope.spawn(async move {
            tokio::select! {
                _ = cancelled => debug!(%channel_id, "request body abandoned on termination"),
                _ = pump(channel_id, body, sink) => {}
            }
        });
        Ok(())
    }

    /// Takes the request body for direct consumption; counts as accepting it.
    pub fn take_input(&mut self) -> Result<ReqBody, ControllerError> {
        self.ensure_usable()?;
        match self.input.take() {
            Some(body) => Ok(body),
            None => Err(self.violate(ProtocolViolation::AlreadyAccepted(self.channel_id))),
        }
    }

    /// Interim `100 Continue` responses are not supported; every call is a violation.
    ///
    /// After a final response has been set the violation is
    /// [`ProtocolViolation::ContinueAfterFinal`].
    pub fn http_continue(&mut self, headers: HeaderMap) -> Result<(), ControllerError> {
        self.ensure_usable()?;
        debug!(channel_id = %self.channel_id, headers = headers.len(), "interim continue requested");
        let violation = match self.phase {
            Phase::Open => ProtocolViolation::InterimUnsupported(self.channel_id),
            _ => ProtocolViolation::ContinueAfterFinal(self.channel_id),
        };
        Err(self.violate(violation))
    }

    /// Runs `work` as a unit of work of the controller's scope.
    pub fn dispatch<F>(&self, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.scope.spawn(work)
    }

    fn ensure_usable(&self) -> Result<(), ControllerError> {
        if self.faulted {
            return Err(ProtocolViolation::Faulted(self.channel_id).into());
        }
        Ok(())
    }

    fn violate(&mut self, violation: ProtocolViolation) -> ControllerError {
        error!(channel_id = %self.channel_id, cause = %violation, "protocol violation, faulting controller");
        self.faulted = true;
        // abandon the slot so the connection closes instead of emitting anything more
        self.output = None;
        violation.into()
    }
}

async fn pump(channel_id: ChannelId, mut body: ReqBody, mut sink: Option<InputSender>) {
    use futures::SinkExt;

    let mut received = 0usize;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                let Ok(data) = frame.into_data() else { continue };
                received += data.len();
                if let Some(sender) = sink.as_mut()
                    && sender.send(Ok(data)).await.is_err()
                {
                    debug!(%channel_id, "request body receiver dropped, discarding the rest");
                    sink = None;
                }
            }
            Err(e) => {
                warn!(%channel_id, cause = %e, "request body failed");
                if let Some(mut sender) = sink {
                    let _ = sender.send(Err(e)).await;
                }
                return;
            }
        }
    }

    debug!(%channel_id, received, discarded = sink.is_none(), "request body drained");
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("channel_id", &self.channel_id)
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("state", &self.state())
            .field("faulted", &self.faulted)
            .finish()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if !self.faulted && matches!(self.phase, Phase::Open | Phase::ResponseSet(_)) {
            warn!(channel_id = %self.channel_id, path = self.request.path(), "controller dropped without a response");
        }
    }
}
