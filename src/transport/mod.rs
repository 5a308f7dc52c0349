//! # Transport Layer
//!
//! Concrete transports that drive a [`Session`](crate::session::Session).
//! The session core itself never does I/O; this module is one way to connect
//! it to a socket.
//!
//! ## Components
//! - **TCP**: Tokio client bridge with a queued writer task

pub mod tcp;
