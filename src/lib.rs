//! # meanwhile
//!
//! Session protocol core for Sametime-style community clients.
//!
//! The crate speaks the binary, handshake-based client protocol: it frames and
//! parses messages, drives the handshake and login state machine, and hands
//! post-login traffic to upper layers. It is transport-agnostic. Callers feed
//! received bytes into [`Session::receive`] and supply callbacks that write
//! bytes and close the connection.
//!
//! ## Layout
//! - [`core`]: keepalive and length-prefixed framing, field encoding, the Tokio codec
//! - [`protocol`]: typed messages, the login state machine, post-login dispatch
//! - [`session`]: the session object, its properties, callbacks and lifecycle
//! - [`transport`]: a Tokio TCP bridge used by the `mw-client` binary
//! - [`config`]: TOML / environment configuration with validation
//! - [`utils`]: logging setup and per-session metrics
//!
//! ## Quick start
//! ```rust,no_run
//! use meanwhile::config::ClientConfig;
//! use meanwhile::session::SessionHandler;
//! use meanwhile::transport::tcp;
//!
//! # async fn run() -> meanwhile::error::Result<()> {
//! let mut config = ClientConfig::default();
//! config.connection.server_host = "community.example.com".into();
//! let handler = SessionHandler::new()
//!     .on_state_change(|state, _info| println!("{}", state.description()));
//! let summary = tcp::run_client(&config, "alice", "hunter2", handler).await?;
//! println!("ended in {:?}", summary.final_state);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;

pub use crate::core::codec::FrameCodec;
pub use crate::core::frame::{Decoded, Frame};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::Dispatcher;
pub use crate::protocol::message::Message;
pub use crate::session::{
    Session, SessionControl, SessionHandler, SessionState, StateInfo, StopReason,
};
