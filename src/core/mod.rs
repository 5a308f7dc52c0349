//! # Core Protocol Components
//!
//! Byte-level framing and field encoding.
//!
//! ## Components
//! - **Wire**: primitive readers and writers (integers, strings, opaques)
//! - **Frame**: pure decode/encode of keepalives and length-prefixed messages
//! - **Codec**: Tokio codec that keeps partial frames between reads
//!
//! ## Wire Format
//! ```text
//! Keepalive: [0x80]
//! Message:   [Length(4)] [Type(2)] [Options(2)] [Channel(4)] [Body(N)]
//! ```
//!
//! ## Limits
//! - The length prefix never has its high bit set
//! - Lengths above the configured maximum are rejected before any allocation

pub mod codec;
pub mod frame;
pub mod wire;

pub use codec::FrameCodec;
pub use frame::{Decoded, Frame};
