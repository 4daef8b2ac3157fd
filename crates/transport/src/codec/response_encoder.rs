use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError, forbids_body};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes a sequence of responses: each head must be followed by its
/// payload items up to and including [`PayloadItem::Eof`](crate::protocol::PayloadItem::Eof)
/// before the next head is accepted.
#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_size = if forbids_body(head.status()) { PayloadSize::Empty } else { payload_size };
                self.payload_encoder = Some(PayloadEncoder::from(payload_size));
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);
                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PayloadItem, ReasonPhrase};
    use bytes::Bytes;
    use http::{Response, StatusCode};

    fn head(status: StatusCode) -> ResponseHead {
        Response::builder().status(status).body(()).unwrap()
    }

    #[test]
    fn chunked_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), PayloadSize::Chunked)), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from_static(b"abc"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n");
    }

    #[test]
    fn bodyless_status_drops_payload() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let mut head = head(StatusCode::NO_CONTENT);
        head.extensions_mut().insert(ReasonPhrase::try_new("NO CONTENT").unwrap());
        encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Chunked)), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 204 NO CONTENT\r\n\r\n");
    }

    #[test]
    fn head_before_previous_payload_finished() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), PayloadSize::Length(3))), &mut dst).unwrap();
        let second = encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), PayloadSize::Length(3))), &mut dst);
        assert!(second.is_err());
    }

    #[test]
    fn payload_without_head() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let result = encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst);
        assert!(result.is_err());
    }
}
