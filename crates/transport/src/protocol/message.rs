use bytes::{Buf, Bytes};

/// A unit handed to the response encoder: the framed head of a response
/// followed by its payload items.
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// One item of a payload stream: a chunk of data, or the end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How a payload is delimited on the wire.
///
/// - `Length`: the exact number of bytes is declared up front (`Content-Length`)
/// - `Chunked`: the length is unknown when the head is written (`Transfer-Encoding: chunked`)
/// - `Empty`: the message carries no payload at all
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    Empty,
}

impl PayloadSize {
    /// Selects the framing for a declared response length; `None` means the
    /// producer does not know the length yet.
    #[inline]
    pub fn from_length(length: Option<u64>) -> Self {
        match length {
            None => PayloadSize::Chunked,
            Some(0) => PayloadSize::Empty,
            Some(n) => PayloadSize::Length(n),
        }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PayloadSize;

    #[test]
    fn unknown_length_is_chunked() {
        assert_eq!(PayloadSize::from_length(None), PayloadSize::Chunked);
        assert!(PayloadSize::from_length(None).is_chunked());
    }

    #[test]
    fn known_length_is_fixed() {
        assert_eq!(PayloadSize::from_length(Some(42)), PayloadSize::Length(42));
        assert_eq!(PayloadSize::from_length(Some(0)), PayloadSize::Empty);
    }
}
