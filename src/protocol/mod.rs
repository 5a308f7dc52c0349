//! # Protocol Layer
//!
//! Typed messages, the login state machine and post-login routing.
//!
//! ## Components
//! - **Message**: the thirteen message types and their bodies
//! - **Handshake**: pure transition function from (state, message) to steps
//! - **Dispatcher**: opcode routing for channel traffic once logged in

pub mod dispatcher;
pub mod handshake;
pub mod message;
