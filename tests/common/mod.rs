//! Shared fixtures: a recording transport and canned server messages.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use meanwhile::core::frame::{self, Decoded, Frame};
use meanwhile::protocol::message::*;
use meanwhile::session::{property, PropertyValue, Session, SessionHandler, SessionState, StateInfo};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Recorded {
    pub written: Vec<u8>,
    pub closes: usize,
    pub states: Vec<(SessionState, StateInfo)>,
    pub admin: Vec<String>,
    pub statuses: Vec<UserStatus>,
    pub privacy: Vec<PrivacyInfo>,
    pub clears: usize,
}

/// Records everything a session does through its callbacks.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Recorded>>,
    fail_writes: Arc<AtomicBool>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler with every callback wired to this recorder.
    pub fn handler(&self) -> SessionHandler {
        let write = self.clone();
        let close = self.clone();
        let state = self.clone();
        let admin = self.clone();
        let status = self.clone();
        let privacy = self.clone();
        let clear = self.clone();

        SessionHandler::new()
            .on_io_write(move |bytes| {
                if write.fail_writes.load(Ordering::SeqCst) {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
                }
                write.lock().written.extend_from_slice(bytes);
                Ok(())
            })
            .on_io_close(move || close.lock().closes += 1)
            .on_state_change(move |s, info| state.lock().states.push((s, info.clone())))
            .on_admin(move |text| admin.lock().admin.push(text.to_string()))
            .on_set_user_status(move |s| status.lock().statuses.push(s.clone()))
            .on_set_privacy_info(move |p| privacy.lock().privacy.push(p.clone()))
            .on_clear(move || clear.lock().clears += 1)
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.lock().states.iter().map(|(s, _)| *s).collect()
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Every frame written so far, decoded.
    pub fn frames(&self) -> Vec<Frame> {
        decode_all(&self.lock().written)
    }

    /// Messages written so far, keepalives skipped.
    pub fn sent(&self) -> Vec<Message> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Frame::Message(m) => Some(m),
                Frame::Keepalive => None,
            })
            .collect()
    }

    pub fn clear_written(&self) {
        self.lock().written.clear();
    }
}

pub fn decode_all(mut bytes: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        match frame::decode(bytes).unwrap() {
            Decoded::Frame(f, used) => {
                frames.push(f);
                bytes = &bytes[used..];
            }
            Decoded::Incomplete => panic!("trailing partial frame in written bytes"),
        }
    }
    frames
}

/// Wire bytes for a server message.
pub fn wire(message: Message) -> Vec<u8> {
    frame::encode(&Frame::Message(message)).to_vec()
}

pub fn handshake_ack() -> Message {
    Message::HandshakeAck(HandshakeAck {
        version: Version::new(0x001e, 0x001d),
        server_addr: 0xc0a8_0001,
        extension: Some(HandshakeAckExt::default()),
    })
}

pub fn login_ack() -> Message {
    Message::LoginAck(LoginAck {
        login_id: "01AB-CDEF".into(),
        login_type: 0x1700,
        user_id: "alice".into(),
        user_name: "Alice Example".into(),
        community: String::new(),
        status: UserStatus {
            status: StatusKind::Active,
            time: 0,
            description: String::new(),
        },
    })
}

/// A new session with credentials set, plus its recorder.
pub fn session() -> (Session, Recorder) {
    let recorder = Recorder::new();
    let mut session = Session::new(recorder.handler()).unwrap();
    session
        .set_property(property::AUTH_USER_ID, "alice".into())
        .unwrap();
    session
        .set_property(property::AUTH_PASSWORD, PropertyValue::secret("hunter2"))
        .unwrap();
    (session, recorder)
}

/// A session driven all the way to `Started`.
pub fn started_session() -> (Session, Recorder) {
    let (mut session, recorder) = session();
    session.start().unwrap();
    session.receive(&wire(handshake_ack())).unwrap();
    session.receive(&wire(login_ack())).unwrap();
    assert_eq!(session.state(), SessionState::Started);
    (session, recorder)
}
