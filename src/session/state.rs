//! Session lifecycle states and the information attached to a transition.

use std::fmt;

/// Stop reason codes carried in CHANNEL_DESTROY.
pub mod reason {
    /// Orderly shutdown requested by the local side.
    pub const NORMAL: u32 = 0x0000_0000;
    /// Generic failure.
    pub const FAILURE: u32 = 0x8000_0000;
    /// The transport dropped or could not be written to.
    pub const CONNECTION_BROKEN: u32 = 0x8000_0002;
}

/// Lifecycle of a session.
///
/// ```text
/// Unknown -> Starting -> Handshake -> HandshakeAck -> Login
///   Login -> LoginAck -> Started
///   Login -> LoginRedir (-> LoginCont)
///   Login -> LoginCont -> LoginAck
///   any non-terminal -> Stopping -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created but not started.
    Unknown,
    Starting,
    /// HANDSHAKE sent, waiting for the ack.
    Handshake,
    HandshakeAck,
    /// LOGIN sent, waiting for the server's verdict.
    Login,
    /// The server asked the client to log in elsewhere.
    LoginRedir,
    LoginCont,
    LoginAck,
    /// Logged in; frames are delivered to upper layers.
    Started,
    Stopping,
    /// Terminal.
    Stopped,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Stopped
    }

    /// Stopping or stopped: no protocol traffic is processed any more.
    pub fn is_stopping(self) -> bool {
        matches!(self, SessionState::Stopping | SessionState::Stopped)
    }

    /// Whether the state machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Stopping, Stopped) => true,
            (Stopping | Stopped, _) => false,
            (_, Stopping) => true,
            (Unknown, Starting)
            | (Starting, Handshake)
            | (Handshake, HandshakeAck)
            | (HandshakeAck, Login)
            | (Login, LoginRedir | LoginCont | LoginAck)
            | (LoginRedir, LoginCont)
            | (LoginCont, LoginAck)
            | (LoginAck, Started) => true,
            _ => false,
        }
    }

    /// Progress label, numbered in the order a successful login walks the states.
    pub fn description(self) -> &'static str {
        match self {
            SessionState::Unknown => "Session not started",
            SessionState::Starting => "[2] Sending Handshake",
            SessionState::Handshake => "[3] Waiting for Handshake Acknowledgement",
            SessionState::HandshakeAck => "[4] Handshake Acknowledged, Sending Login",
            SessionState::Login => "[5] Waiting for Login Acknowledgement",
            SessionState::LoginRedir => "[6] Login redirected",
            SessionState::LoginCont => "[7] Forcing login",
            SessionState::LoginAck => "[8] Login Acknowledged",
            SessionState::Started => "[9] Starting services",
            SessionState::Stopping => "Stopping session",
            SessionState::Stopped => "Session stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Why a session is stopping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `Session::stop` was called with this reason code.
    Requested(u32),
    /// The server destroyed the master channel with this reason code.
    Remote(u32),
    /// A framing, state machine or transport error.
    Fault(String),
}

impl StopReason {
    /// Reason code to put on the wire.
    pub fn code(&self) -> u32 {
        match self {
            StopReason::Requested(code) | StopReason::Remote(code) => *code,
            StopReason::Fault(_) => reason::FAILURE,
        }
    }
}

/// Extra information delivered with a state change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateInfo {
    #[default]
    None,
    /// Entering `LoginRedir`: where the server wants the client to go.
    Redirect { host: String, port: Option<u16> },
    /// Entering `Stopping`.
    Stopping { reason: StopReason },
}

impl StateInfo {
    /// Build redirect info from a `host` or `host:port` string.
    pub fn redirect(target: &str) -> Self {
        let (host, port) = split_host_port(target);
        StateInfo::Redirect {
            host: host.to_string(),
            port,
        }
    }
}

/// Split an optional numeric `:port` suffix. Bracketed IPv6 literals keep their
/// brackets stripped; a bare IPv6 address is returned whole.
fn split_host_port(target: &str) -> (&str, Option<u16>) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (target, None),
        },
        _ => (target, None),
    }
}
