use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use micro_transport::protocol::ParseError;
use micro_transport::protocol::body::ReqBody;
use tracing::debug;

use super::Controller;
use crate::error::{ControllerError, InputError};

impl Controller {
    /// Buffers the whole request body, then hands the controller back to `callback`.
    ///
    /// With a `limit`, a body larger than `limit` bytes is reported as
    /// [`InputError::TooLarge`] as soon as the limit is crossed. The buffering
    /// runs as a unit of work of the controller's scope; terminating the scope
    /// stops it and hands the controller back with [`InputError::Interrupted`].
    pub fn read_input_into_buffer<F>(mut self, limit: Option<usize>, callback: F) -> Result<(), ControllerError>
    where
        F: FnOnce(Controller, Result<Bytes, InputError>) + Send + 'static,
    {
        let body = self.take_input()?;
        let scope = self.scope.clone();
        let cancelled = scope.cancelled();
        scope.spawn(async move {
            let input = tokio::select! {
                _ = cancelled => Err(InputError::Interrupted),
                input = collect(body, limit) => input,
            };
            debug!(channel_id = %self.channel_id, ok = input.is_ok(), "request body buffered");
            callback(self, input);
        });
        Ok(())
    }
}

async fn collect(body: ReqBody, limit: Option<usize>) -> Result<Bytes, InputError> {
    let Some(limit) = limit else {
        return Ok(body.collect().await?.to_bytes());
    };

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(InputError::TooLarge { limit }),
        Err(e) => match e.downcast::<ParseError>() {
            Ok(e) => Err(InputError::Body(*e)),
            Err(e) => Err(InputError::Body(ParseError::invalid_body(e))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{controller, get};
    use super::*;
    use futures::channel::oneshot;
    use micro_transport::protocol::PayloadSize;

    #[tokio::test]
    async fn buffers_the_whole_body() {
        let (mut sender, body) = ReqBody::channel(PayloadSize::Chunked);
        let (ctl, _catenation) = controller(get("/upload"), body);
        let scope = ctl.scope().clone();
        let (done, result) = oneshot::channel();

        ctl.read_input_into_buffer(None, move |mut ctl, input| {
            let input = input.unwrap();
            ctl.write_output(&mime::APPLICATION_OCTET_STREAM, input.clone()).unwrap();
            done.send(input).unwrap();
        })
        .unwrap();

        sender.send(Bytes::from_static(b"abc")).await.unwrap();
        sender.send(Bytes::from_static(b"def")).await.unwrap();
        sender.finish().await.unwrap();

        assert_eq!(result.await.unwrap(), Bytes::from_static(b"abcdef"));
        scope.terminate().await;
    }

    #[tokio::test]
    async fn limit_is_enforced() {
        let body = ReqBody::once(Bytes::from_static(b"0123456789"));
        let (ctl, _catenation) = controller(get("/upload"), body);
        let (done, result) = oneshot::channel();

        ctl.read_input_into_buffer(Some(4), move |mut ctl, input| {
            done.send(matches!(input, Err(InputError::TooLarge { limit: 4 }))).unwrap();
            ctl.set_response(http::StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD TOO LARGE", Some(0), None).unwrap();
            ctl.connect(None).unwrap();
        })
        .unwrap();

        assert!(result.await.unwrap());
    }

    #[tokio::test]
    async fn truncated_body_is_reported() {
        let (mut sender, body) = ReqBody::channel(PayloadSize::Length(8));
        let (ctl, _catenation) = controller(get("/upload"), body);
        let (done, result) = oneshot::channel();

        ctl.read_input_into_buffer(Some(1024), move |_ctl, input| {
            done.send(matches!(input, Err(InputError::Body(ParseError::InvalidBody { .. })))).unwrap();
        })
        .unwrap();

        sender.send(Bytes::from_static(b"half")).await.unwrap();
        drop(sender);
        assert!(result.await.unwrap());
    }

    #[tokio::test]
    async fn already_accepted_input_cannot_be_buffered() {
        let (mut ctl, _catenation) = controller(get("/upload"), ReqBody::empty());
        ctl.accept(None).unwrap();
        let err = ctl.read_input_into_buffer(None, |_, _| {}).unwrap_err();
        assert!(err.is_violation());
    }
}
