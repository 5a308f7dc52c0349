//! Tokio codec for the frame layer.
//!
//! The codec is what gives the session its buffering rule: bytes that do not yet
//! form a complete frame stay in the `BytesMut` and are completed by the next
//! chunk handed to the decoder.

use crate::config::MAX_FRAME_SIZE;
use crate::core::frame::{self, Frame, KEEPALIVE_BYTE, LENGTH_PREFIX_LEN};
use crate::error::ProtocolError;
use crate::protocol::message::Message;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&first) = src.first() else {
            return Ok(None);
        };

        if first == KEEPALIVE_BYTE {
            src.advance(1);
            return Ok(Some(Frame::Keepalive));
        }

        let Some(len) = frame::message_len(src, self.max_frame_size)? else {
            return Ok(None);
        };

        let total = LENGTH_PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        // Zero-copy: split the frame off the buffer and hand the body to the parser
        let mut raw = src.split_to(total);
        raw.advance(LENGTH_PREFIX_LEN);
        let message = Message::decode(raw.freeze())?;
        Ok(Some(Frame::Message(message)))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Frame>>::encode(self, &item, dst)
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if let Frame::Message(message) = item {
            let len = message.encoded_len();
            if len > self.max_frame_size {
                return Err(ProtocolError::OversizedFrame(len));
            }
        }
        frame::encode_into(item, dst);
        Ok(())
    }
}

impl Encoder<&Message> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.encoded_len();
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(len));
        }
        dst.reserve(LENGTH_PREFIX_LEN + len);
        dst.extend_from_slice(&(len as u32).to_be_bytes());
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_keepalive_between_messages() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let msg = Message::Admin {
            text: "restart at 5".into(),
        };
        codec.encode(&msg, &mut buf).unwrap();
        codec.encode(Frame::Keepalive, &mut buf).unwrap();
        codec.encode(&msg, &mut buf).unwrap();

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Message(msg.clone()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Keepalive));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Message(msg)));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encoder_respects_limit() {
        let mut codec = FrameCodec::with_max_frame_size(64);
        let msg = Message::ChannelSend {
            channel: 7,
            body: Bytes::from(vec![0u8; 128]),
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(&msg, &mut buf),
            Err(ProtocolError::OversizedFrame(136))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_corrupt_body_leaves_nothing_behind() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0, 0, 0, 8, 0x7e, 0x7e, 0, 0, 0, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameCorrupt(_))
        ));
        assert!(buf.is_empty());
    }
}
