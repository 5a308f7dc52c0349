//! Transport-level framing.
//!
//! The byte stream carries two kinds of frames:
//!
//! ```text
//! Keepalive: [0x80]
//! Message:   [Length(4)] [Message(Length)]
//! ```
//!
//! A message length never has its high bit set, so a leading `0x80` byte is
//! always a keepalive. `decode` is pure: it never consumes input and reports how
//! many bytes the frame occupied, leaving buffering to the caller
//! ([`FrameCodec`](crate::core::codec::FrameCodec) keeps the unconsumed tail).

use crate::config::MAX_FRAME_SIZE;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use bytes::{BufMut, Bytes, BytesMut};

/// The single byte sent as a keepalive.
pub const KEEPALIVE_BYTE: u8 = 0x80;

/// Size of the length prefix in front of each message.
pub const LENGTH_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Keepalive,
    Message(Message),
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Frame::Message(message)
    }
}

/// Outcome of a single decode attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete frame and the number of input bytes it occupied.
    Frame(Frame, usize),
    /// More input is needed before a frame can be produced.
    Incomplete,
}

/// Decode the first frame in `buf` using the default size limit.
pub fn decode(buf: &[u8]) -> Result<Decoded> {
    decode_with_limit(buf, MAX_FRAME_SIZE)
}

/// Decode the first frame in `buf`, rejecting messages larger than `max_frame_size`.
pub fn decode_with_limit(buf: &[u8], max_frame_size: usize) -> Result<Decoded> {
    let Some(&first) = buf.first() else {
        return Ok(Decoded::Incomplete);
    };

    if first == KEEPALIVE_BYTE {
        return Ok(Decoded::Frame(Frame::Keepalive, 1));
    }

    let Some(len) = message_len(buf, max_frame_size)? else {
        return Ok(Decoded::Incomplete);
    };

    let total = LENGTH_PREFIX_LEN + len;
    if buf.len() < total {
        return Ok(Decoded::Incomplete);
    }

    let body = Bytes::copy_from_slice(&buf[LENGTH_PREFIX_LEN..total]);
    let message = Message::decode(body)?;
    Ok(Decoded::Frame(Frame::Message(message), total))
}

/// Validate the length prefix at the start of `buf`. `None` if fewer than four
/// bytes are available.
pub(crate) fn message_len(buf: &[u8], max_frame_size: usize) -> Result<Option<usize>> {
    if buf.len() < LENGTH_PREFIX_LEN {
        return Ok(None);
    }

    let raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if raw & 0x8000_0000 != 0 {
        return Err(ProtocolError::FrameCorrupt(
            constants::ERR_LENGTH_RESERVED_BIT.into(),
        ));
    }

    let len = raw as usize;
    if len > max_frame_size {
        return Err(ProtocolError::OversizedFrame(len));
    }
    Ok(Some(len))
}

/// Encode a frame into a fresh buffer.
pub fn encode(frame: &Frame) -> Bytes {
    let mut dst = BytesMut::new();
    encode_into(frame, &mut dst);
    dst.freeze()
}

/// Append an encoded frame to `dst`.
pub fn encode_into(frame: &Frame, dst: &mut BytesMut) {
    match frame {
        Frame::Keepalive => dst.put_u8(KEEPALIVE_BYTE),
        Frame::Message(message) => {
            let len = message.encoded_len();
            dst.reserve(LENGTH_PREFIX_LEN + len);
            dst.put_u32(len as u32);
            message.encode(dst);
        }
    }
}
