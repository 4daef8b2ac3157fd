use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let size = bytes.remaining() as u64;
                if size > self.remaining {
                    warn!(size, remaining = self.remaining, "payload exceeds the declared content-length");
                    return Err(SendError::invalid_body("payload exceeds the declared content-length"));
                }

                self.remaining -= size;
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(len);
                }
                Ok(())
            }
            PayloadItem::Eof => {
                if self.remaining > 0 {
                    warn!(remaining = self.remaining, "payload ended before the declared content-length");
                    return Err(SendError::invalid_body("payload shorter than the declared content-length"));
                }
                self.eof = true;
                Ok(())
            }
        }
    }
}
