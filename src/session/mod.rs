//! # Session Core
//!
//! A [`Session`] owns one connection's worth of protocol state and nothing
//! else. It never opens sockets or spawns tasks: the transport pushes inbound
//! bytes into [`Session::receive`] and the session pushes outbound bytes and
//! close requests back through the [`SessionHandler`] callbacks.
//!
//! ## Lifecycle
//! 1. `Session::new(handler)` (both `io_write` and `io_close` are mandatory)
//! 2. `set_property` for `AUTH_USER_ID` / `AUTH_PASSWORD`
//! 3. `start()` writes the handshake
//! 4. `receive(bytes)` for every chunk read from the transport
//! 5. `stop(reason)` then `free()` (also run on drop)
//!
//! ## Errors
//! Framing faults, unexpected messages and failed writes never come back from
//! `receive` or `send`. They stop the session (`Stopping` carrying
//! [`StopReason::Fault`], one `io_close`, then `Stopped`) and are kept in
//! [`Session::last_error`]. Once stopped, every operation except `stop` and
//! `free` returns [`ProtocolError::SessionClosed`].
//!
//! ## Example
//! ```rust
//! use meanwhile::session::{property, PropertyValue, Session, SessionHandler};
//! use std::sync::{Arc, Mutex};
//!
//! let written = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&written);
//! let handler = SessionHandler::new()
//!     .on_io_write(move |bytes| {
//!         sink.lock().unwrap().extend_from_slice(bytes);
//!         Ok(())
//!     })
//!     .on_io_close(|| {});
//!
//! let mut session = Session::new(handler)?;
//! session.set_property(property::AUTH_USER_ID, "alice".into())?;
//! session.set_property(property::AUTH_PASSWORD, PropertyValue::secret("hunter2"))?;
//! session.start()?;
//! assert!(!written.lock().unwrap().is_empty());
//! # Ok::<(), meanwhile::error::ProtocolError>(())
//! ```

pub mod client_data;
pub mod control;
pub mod handler;
pub mod property;
pub mod state;

pub use client_data::ClientData;
pub use control::SessionControl;
pub use handler::SessionHandler;
pub use property::{Properties, PropertyValue};
pub use state::{reason, SessionState, StateInfo, StopReason};

use crate::config::SessionConfig;
use crate::core::codec::FrameCodec;
use crate::core::frame::{Frame, KEEPALIVE_BYTE, LENGTH_PREFIX_LEN};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake::{self, Step};
use crate::protocol::message::{Message, MessageType, PrivacyInfo, UserStatus, MASTER_CHANNEL};
use crate::utils::metrics::Metrics;
use bytes::{Bytes, BytesMut};
use std::any::Any;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, instrument, trace, warn};

/// One client session with a community server.
pub struct Session {
    state: SessionState,
    handler: SessionHandler,
    props: Properties,
    client_data: ClientData,
    codec: FrameCodec,
    inbound: BytesMut,
    user_status: UserStatus,
    privacy: PrivacyInfo,
    dispatcher: Dispatcher,
    control: SessionControl,
    metrics: Arc<Metrics>,
    last_error: Option<ProtocolError>,
    handshake_sent: bool,
    transport_closed: bool,
    freed: bool,
}

impl Session {
    /// Create a session. Fails with `InvalidHandler` naming the first missing
    /// mandatory callback.
    pub fn new(handler: SessionHandler) -> Result<Self> {
        if let Some(missing) = handler.missing_mandatory() {
            return Err(ProtocolError::InvalidHandler(missing));
        }

        Ok(Self {
            state: SessionState::Unknown,
            handler,
            props: Properties::new(),
            client_data: ClientData::new(),
            codec: FrameCodec::new(),
            inbound: BytesMut::new(),
            user_status: UserStatus::default(),
            privacy: PrivacyInfo::default(),
            dispatcher: Dispatcher::new(),
            control: SessionControl::new(),
            metrics: Arc::new(Metrics::new()),
            last_error: None,
            handshake_sent: false,
            transport_closed: false,
            freed: false,
        })
    }

    /// Create a session with client identity and frame limit taken from `config`.
    pub fn with_config(handler: SessionHandler, config: &SessionConfig) -> Result<Self> {
        let mut session = Self::new(handler)?;
        session.codec = FrameCodec::with_max_frame_size(config.max_frame_size);
        session
            .props
            .set(property::CLIENT_TYPE, config.client_type.into());
        session
            .props
            .set(property::CLIENT_VER_MAJOR, config.client_ver_major.into());
        session
            .props
            .set(property::CLIENT_VER_MINOR, config.client_ver_minor.into());
        if !config.client_host.is_empty() {
            session
                .props
                .set(property::CLIENT_HOST, config.client_host.as_str().into());
        }
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The error that stopped the session, if one did.
    pub fn last_error(&self) -> Option<&ProtocolError> {
        self.last_error.as_ref()
    }

    /// Status from the login ack or the latest SET_USER_STATUS.
    pub fn user_status(&self) -> &UserStatus {
        &self.user_status
    }

    pub fn privacy_info(&self) -> &PrivacyInfo {
        &self.privacy
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Routing table for post-login channel messages.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle for requesting a stop or free from inside a callback.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn properties(&self) -> &Properties {
        &self.props
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.props.get(key)
    }

    /// Set a property. Credentials are only accepted before `start`.
    pub fn set_property(&mut self, key: &str, value: PropertyValue) -> Result<()> {
        if self.freed {
            return Err(ProtocolError::SessionClosed);
        }
        if is_credential(key) && self.state != SessionState::Unknown {
            return Err(ProtocolError::InvalidState {
                state: self.state,
                reason: constants::ERR_CREDENTIALS_LOCKED,
            });
        }
        self.props.set(key, value);
        Ok(())
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.props.remove(key)
    }

    /// Attach caller data. `cleanup` runs exactly once: when the data is
    /// replaced, removed, or the session is freed.
    pub fn set_client_data<T, F>(&mut self, data: T, cleanup: Option<F>) -> Result<()>
    where
        T: Any + Send,
        F: FnOnce(T) + Send + 'static,
    {
        if self.freed {
            return Err(ProtocolError::SessionClosed);
        }
        self.client_data.set(data, cleanup);
        Ok(())
    }

    pub fn client_data<T: Any>(&self) -> Option<&T> {
        self.client_data.get::<T>()
    }

    pub fn client_data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.client_data.get_mut::<T>()
    }

    /// Drop the client data now, running its cleanup.
    pub fn remove_client_data(&mut self) {
        self.client_data.clear();
    }

    /// Begin the handshake.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.freed || self.state.is_stopping() {
            return Err(ProtocolError::SessionClosed);
        }
        if self.state != SessionState::Unknown {
            return Err(ProtocolError::AlreadyStarted);
        }

        info!("Starting session");
        let steps = handshake::start(&self.props);
        self.run_steps(steps);
        self.apply_deferred();
        Ok(())
    }

    /// Feed bytes read from the transport. Partial frames are kept until the
    /// rest arrives.
    #[instrument(skip_all, fields(len = data.len()))]
    pub fn receive(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(());
        }

        self.metrics.bytes_in(data.len() as u64);
        self.inbound.extend_from_slice(data);

        while !self.halted() {
            match self.codec.decode(&mut self.inbound) {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => break,
                Err(ProtocolError::OversizedFrame(len)) => {
                    self.fail(ProtocolError::FrameCorrupt(format!(
                        "{} ({len} > {})",
                        constants::ERR_LENGTH_OVER_LIMIT,
                        self.codec.max_frame_size()
                    )));
                    break;
                }
                Err(err) => {
                    self.fail(err);
                    break;
                }
            }
        }

        self.apply_deferred();
        Ok(())
    }

    /// Encode and write a message. Only valid once login has completed; the
    /// handshake and login frames are written by the session itself.
    ///
    /// A message too large for the frame limit is rejected without touching the
    /// transport. A failed write stops the session and still returns `Ok`.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.ensure_started()?;
        if let Err(err) = self.write_message(message) {
            if !err.is_fatal() || matches!(err, ProtocolError::OversizedFrame(_)) {
                return Err(err);
            }
            self.fail(err);
        }
        self.apply_deferred();
        Ok(())
    }

    /// Write a single keepalive byte.
    pub fn send_keepalive(&mut self) -> Result<()> {
        self.ensure_open()?;
        match self.write_bytes(&[KEEPALIVE_BYTE]) {
            Ok(()) => {
                trace!("Keepalive sent");
                self.metrics.keepalive_sent();
            }
            Err(err) => self.fail(err),
        }
        self.apply_deferred();
        Ok(())
    }

    /// Publish a new presence status. Only valid once started.
    pub fn set_user_status(&mut self, status: UserStatus) -> Result<()> {
        self.send(&Message::SetUserStatus(status.clone()))?;
        self.user_status = status;
        Ok(())
    }

    /// Publish a new privacy list. Only valid once started.
    pub fn set_privacy_info(&mut self, info: PrivacyInfo) -> Result<()> {
        self.send(&Message::SetPrivacyList(info.clone()))?;
        self.privacy = info;
        Ok(())
    }

    /// Ignore a login redirect and continue logging in to the current server.
    #[instrument(skip(self))]
    pub fn force_login(&mut self) -> Result<()> {
        self.ensure_open()?;
        let steps = handshake::force_login(self.state)?;
        self.run_steps(steps);
        self.apply_deferred();
        Ok(())
    }

    /// Stop the session. The close callback runs once no matter how often this
    /// is called.
    #[instrument(skip(self))]
    pub fn stop(&mut self, reason: u32) -> Result<()> {
        if self.freed {
            return Err(ProtocolError::SessionClosed);
        }
        self.shutdown(StopReason::Requested(reason), true);
        self.apply_deferred();
        Ok(())
    }

    /// Release everything: stops a running session, runs the client-data cleanup
    /// and the `clear` callback, drops buffers and properties. Idempotent.
    pub fn free(&mut self) {
        if self.freed {
            return;
        }
        if !matches!(self.state, SessionState::Unknown | SessionState::Stopped) {
            self.shutdown(StopReason::Requested(reason::NORMAL), true);
        }

        self.freed = true;
        self.client_data.clear();
        if let Some(clear) = self.handler.clear.take() {
            clear();
        }
        self.handler = SessionHandler::default();
        self.props.clear();
        self.inbound = BytesMut::new();
        self.control.take_stop();
        self.control.take_free();
        debug!("Session freed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.freed || self.state.is_stopping() {
            Err(ProtocolError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_started(&self) -> Result<()> {
        self.ensure_open()?;
        if self.state != SessionState::Started {
            return Err(ProtocolError::InvalidState {
                state: self.state,
                reason: constants::ERR_NOT_STARTED,
            });
        }
        Ok(())
    }

    /// Whether step execution must stop here.
    fn halted(&self) -> bool {
        self.freed || self.state.is_stopping() || self.control.is_pending()
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Keepalive => {
                trace!("Keepalive received");
                self.metrics.keepalive_received();
            }
            Frame::Message(message) => {
                self.metrics.frame_received();
                trace!(message = message.msg_type().name(), state = ?self.state, "Frame received");
                match handshake::on_message(self.state, &mut self.props, message) {
                    Ok(steps) => self.run_steps(steps),
                    Err(err) => self.fail(err),
                }
            }
        }
    }

    fn run_steps(&mut self, steps: Vec<Step>) {
        for step in steps {
            if self.halted() {
                break;
            }
            match step {
                Step::Enter(next, info) => self.transition(next, info),
                Step::Send(message) => {
                    if let Err(err) = self.write_message(&message) {
                        self.fail(err);
                    }
                }
                Step::RecordStatus(status) => self.user_status = status,
                Step::Deliver(message) => self.deliver(message),
                Step::Stop(reason) => self.shutdown(reason, false),
            }
        }
    }

    fn transition(&mut self, next: SessionState, info: StateInfo) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "Ignoring invalid state transition");
            return;
        }

        self.state = next;
        self.metrics.state_transition();
        info!(state = next.description(), "Session state changed");

        if let Some(on_change) = self.handler.on_state_change.as_mut() {
            on_change(next, &info);
        }
    }

    fn deliver(&mut self, message: Message) {
        match message {
            Message::Admin { text } => {
                info!(text = %text, "Admin message");
                if let Some(on_admin) = self.handler.on_admin.as_mut() {
                    on_admin(&text);
                }
            }
            Message::SetUserStatus(status) => {
                if let Some(on_status) = self.handler.on_set_user_status.as_mut() {
                    on_status(&status);
                }
                self.user_status = status;
            }
            Message::SetPrivacyList(info) => {
                if let Some(on_privacy) = self.handler.on_set_privacy_info.as_mut() {
                    on_privacy(&info);
                }
                self.privacy = info;
            }
            other => match self.dispatcher.dispatch(&other) {
                Ok(Some(reply)) => {
                    if let Err(err) = self.write_message(&reply) {
                        if err.is_fatal() && !matches!(err, ProtocolError::OversizedFrame(_)) {
                            self.fail(err);
                        } else {
                            warn!(error = %err, "Dropping reply from channel handler");
                        }
                    }
                }
                Ok(None) => {}
                Err(ProtocolError::UnhandledMessage(opcode)) => {
                    debug!(opcode = %opcode, channel = other.channel(), "No route for message");
                    self.metrics.unhandled_message();
                }
                Err(err) => {
                    warn!(error = %err, opcode = other.msg_type().name(), "Channel handler failed");
                }
            },
        }
    }

    fn write_message(&mut self, message: &Message) -> Result<()> {
        let mut bytes = BytesMut::with_capacity(LENGTH_PREFIX_LEN + message.encoded_len());
        self.codec.encode(message, &mut bytes)?;
        self.write_bytes(&bytes)?;

        self.metrics.frame_sent(bytes.len() as u64);
        if message.msg_type() == MessageType::Handshake {
            self.handshake_sent = true;
        }
        trace!(message = message.msg_type().name(), len = bytes.len(), "Frame sent");
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let write = self
            .handler
            .io_write
            .as_mut()
            .ok_or(ProtocolError::SessionClosed)?;

        write(bytes).map_err(|e| {
            self.metrics.write_failure();
            ProtocolError::TransportWriteFailed(e.to_string())
        })
    }

    /// Stop on a fatal error and remember it.
    fn fail(&mut self, err: ProtocolError) {
        if self.state.is_stopping() {
            debug!(error = %err, "Error while already stopping");
            return;
        }

        error!(error = %err, state = ?self.state, "Session fault");
        if !matches!(err, ProtocolError::TransportWriteFailed(_)) {
            self.metrics.protocol_error();
        }
        self.inbound.clear();
        let reason = StopReason::Fault(err.to_string());
        self.last_error = Some(err);
        self.shutdown(reason, false);
    }

    fn shutdown(&mut self, reason: StopReason, notify_peer: bool) {
        if self.state.is_stopping() {
            return;
        }

        info!(reason = ?reason, "Stopping session");
        let code = reason.code();
        self.transition(SessionState::Stopping, StateInfo::Stopping { reason });

        if notify_peer && self.handshake_sent {
            let destroy = Message::ChannelDestroy {
                channel: MASTER_CHANNEL,
                reason: code,
                data: Bytes::new(),
            };
            if let Err(err) = self.write_message(&destroy) {
                debug!(error = %err, "Could not tell the server we are leaving");
            }
        }

        self.close_transport();
        self.inbound.clear();
        self.transition(SessionState::Stopped, StateInfo::None);
    }

    fn close_transport(&mut self) {
        if self.transport_closed {
            return;
        }
        self.transport_closed = true;
        if let Some(close) = self.handler.io_close.as_mut() {
            close();
        }
    }

    /// Honour stop/free requests recorded by callbacks.
    fn apply_deferred(&mut self) {
        if self.freed {
            return;
        }
        if let Some(code) = self.control.take_stop() {
            debug!(reason = code, "Deferred stop requested");
            self.shutdown(StopReason::Requested(code), true);
        }
        if self.control.take_free() {
            debug!("Deferred free requested");
            self.free();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("properties", &self.props)
            .field("client_data", &self.client_data)
            .field("buffered", &self.inbound.len())
            .field("freed", &self.freed)
            .finish()
    }
}

fn is_credential(key: &str) -> bool {
    matches!(
        key,
        property::AUTH_USER_ID | property::AUTH_PASSWORD | property::AUTH_TOKEN
    )
}
