//! Primitive field encoding shared by every message body.
//!
//! Integers are big-endian. A *string* is a `u16` byte length followed by UTF-8
//! bytes, an *opaque* is a `u32` byte length followed by raw bytes, and a *bool*
//! is a single byte where any non-zero value is `true`.
//!
//! Readers consume from a [`Bytes`] cursor so opaque payloads are split off
//! without copying.

use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[inline]
fn ensure(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ProtocolError::FrameCorrupt(format!(
            "{} (need {needed} bytes, have {})",
            constants::ERR_TRUNCATED_BODY,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn get_u16(buf: &mut Bytes) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn get_u32(buf: &mut Bytes) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub fn get_bool(buf: &mut Bytes) -> Result<bool> {
    ensure(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

pub fn get_string(buf: &mut Bytes) -> Result<String> {
    let len = get_u16(buf)? as usize;
    ensure(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| ProtocolError::FrameCorrupt(constants::ERR_INVALID_UTF8.into()))
}

pub fn get_opaque(buf: &mut Bytes) -> Result<Bytes> {
    let len = get_u32(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

/// Write a string field. Strings longer than `u16::MAX` bytes are cut at the
/// last character boundary that fits.
pub fn put_string(buf: &mut BytesMut, value: &str) {
    let len = truncated_len(value);
    buf.put_u16(len as u16);
    buf.put_slice(&value.as_bytes()[..len]);
}

pub fn put_opaque(buf: &mut BytesMut, value: &[u8]) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value);
}

pub fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Encoded size of a string field.
#[inline]
pub fn string_len(value: &str) -> usize {
    2 + truncated_len(value)
}

fn truncated_len(value: &str) -> usize {
    let mut len = value.len().min(u16::MAX as usize);
    while !value.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// Encoded size of an opaque field.
#[inline]
pub fn opaque_len(value: &[u8]) -> usize {
    4 + value.len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_string_layout() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "sam");
        assert_eq!(&buf[..], &[0x00, 0x03, b's', b'a', b'm']);

        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes).unwrap(), "sam");
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_opaque_split_is_exact() {
        let mut buf = BytesMut::new();
        put_opaque(&mut buf, &[1, 2, 3]);
        buf.put_u16(0xBEEF);

        let mut bytes = buf.freeze();
        assert_eq!(&get_opaque(&mut bytes).unwrap()[..], &[1, 2, 3]);
        assert_eq!(get_u16(&mut bytes).unwrap(), 0xBEEF);
    }

    #[test]
    fn test_truncated_string_is_corrupt() {
        let mut bytes = Bytes::from_static(&[0x00, 0x05, b'a', b'b']);
        assert!(matches!(
            get_string(&mut bytes),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_corrupt() {
        let mut bytes = Bytes::from_static(&[0x00, 0x02, 0xC3, 0x28]);
        assert!(matches!(
            get_string(&mut bytes),
            Err(ProtocolError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_long_string_truncated_on_char_boundary() {
        // 'é' is two bytes, so 0xFFFF would split the last character
        let value = "é".repeat(40_000);
        let mut buf = BytesMut::new();
        put_string(&mut buf, &value);

        let mut bytes = buf.freeze();
        let decoded = get_string(&mut bytes).unwrap();
        assert_eq!(decoded.len(), 65_534);
        assert!(value.starts_with(&decoded));
    }
}
