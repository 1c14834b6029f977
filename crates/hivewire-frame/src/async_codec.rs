//! `tokio_util` codec for the same wire format, for async engines.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{check_limit, decode_frame, encode_frame};
use crate::error::FrameError;

/// Length-prefixed frame codec for `tokio_util::codec::Framed`.
///
/// Decodes to the frame payload; encodes any byte payload.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    max_payload_size: Option<usize>,
}

impl FrameCodec {
    /// Create a codec without a payload limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec that rejects payloads larger than `max_payload_size`.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: Some(max_payload_size),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(decode_frame(src, self.max_payload_size)?.map(|frame| frame.payload))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        check_limit(item.len(), self.max_payload_size)?;
        encode_frame(&item, dst)
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        check_limit(item.len(), self.max_payload_size)?;
        encode_frame(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(256 * 1024);
        let mut sink = FramedWrite::new(client, FrameCodec::new());
        let mut stream = FramedRead::new(server, FrameCodec::new());

        let big = Bytes::from(vec![0x5A; 80 * 1024]);
        sink.send(Bytes::from_static(b"")).await.unwrap();
        sink.send(Bytes::from_static(b"x")).await.unwrap();
        sink.send(big.clone()).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap().len(), 0);
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"x");
        assert_eq!(stream.next().await.unwrap().unwrap(), big);
    }

    #[test]
    fn truncated_stream_is_connection_closed() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        encode_frame(b"partial", &mut buf).unwrap();
        buf.truncate(6);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn encode_respects_limit() {
        let mut codec = FrameCodec::with_max_payload(2);
        let mut buf = BytesMut::new();
        let err = codec.encode(&b"abc"[..], &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(buf.is_empty());
    }
}
