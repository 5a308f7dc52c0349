//! Handshake and login state machine.
//!
//! The machine is pure: given the current [`SessionState`], the session
//! properties and an inbound message it returns the ordered [`Step`]s the
//! session must carry out. It never touches the transport or the callbacks,
//! which keeps every transition testable without a session.
//!
//! ```text
//! start          Enter(Starting)  Send(HANDSHAKE)  Enter(Handshake)
//! HANDSHAKE_ACK  Enter(HandshakeAck)  Send(LOGIN)  Enter(Login)
//! LOGIN_ACK      Enter(LoginAck)  Enter(Started)
//! LOGIN_REDIRECT Enter(LoginRedir{host, port})
//! LOGIN_CONTINUE Enter(LoginCont)  Send(LOGIN + challenge)
//! ```

use crate::config::{CLIENT_VERSION, DEFAULT_CLIENT_TYPE};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{
    AuthType, Handshake, HandshakeAck, Login, LoginAck, Message, UserStatus, Version,
    HANDSHAKE_HOST_VERSION, MASTER_CHANNEL,
};
use crate::session::property::{self, Properties, PropertyValue};
use crate::session::state::{SessionState, StateInfo, StopReason};
use bytes::Bytes;

use tracing::{debug, instrument, warn};

/// One action for the session to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Change state and fire the state-change callback.
    Enter(SessionState, StateInfo),
    /// Encode and write a message.
    Send(Message),
    /// Record the status the server reported at login.
    RecordStatus(UserStatus),
    /// Hand a post-login message to the upper layers.
    Deliver(Message),
    /// Tear the session down.
    Stop(StopReason),
}

fn enter(state: SessionState) -> Step {
    Step::Enter(state, StateInfo::None)
}

/// Steps for `Session::start`.
#[instrument(skip(props))]
pub fn start(props: &Properties) -> Vec<Step> {
    if props.text(property::AUTH_USER_ID).is_none() {
        warn!("Starting session without AUTH_USER_ID");
    }

    vec![
        enter(SessionState::Starting),
        Step::Send(Message::Handshake(build_handshake(props))),
        enter(SessionState::Handshake),
    ]
}

/// Steps for an inbound message in `state`. Messages the state does not
/// accept are `UnexpectedFrame`.
#[instrument(skip(props, message), fields(msg = message.msg_type().name()))]
pub fn on_message(
    state: SessionState,
    props: &mut Properties,
    message: Message,
) -> Result<Vec<Step>> {
    let steps = match (state, message) {
        (SessionState::Handshake, Message::HandshakeAck(ack)) => {
            record_server_version(props, &ack);
            vec![
                enter(SessionState::HandshakeAck),
                Step::Send(Message::Login(build_login(props, Bytes::new()))),
                enter(SessionState::Login),
            ]
        }

        (SessionState::Login | SessionState::LoginCont, Message::LoginAck(ack)) => {
            let status = record_login(props, ack);
            vec![
                enter(SessionState::LoginAck),
                Step::RecordStatus(status),
                enter(SessionState::Started),
            ]
        }

        (SessionState::Login, Message::LoginRedirect(redirect)) => {
            debug!(host = %redirect.host, server_id = %redirect.server_id, "Login redirected");
            vec![Step::Enter(
                SessionState::LoginRedir,
                StateInfo::redirect(&redirect.host),
            )]
        }

        (SessionState::Login, Message::LoginContinue { data }) => vec![
            enter(SessionState::LoginCont),
            Step::Send(Message::Login(build_login(props, data))),
        ],

        // the server ends the session (or rejects the login) by destroying
        // the master channel
        (
            state,
            Message::ChannelDestroy {
                channel: MASTER_CHANNEL,
                reason,
                ..
            },
        ) if state != SessionState::Unknown => {
            debug!(reason, "Master channel destroyed by server");
            vec![Step::Stop(StopReason::Remote(reason))]
        }

        (SessionState::Started, message) => vec![Step::Deliver(message)],

        (state, message) => {
            return Err(ProtocolError::UnexpectedFrame {
                state,
                message: message.msg_type(),
            })
        }
    };

    Ok(steps)
}

/// Steps for `Session::force_login`: accept a redirect but stay on this server.
pub fn force_login(state: SessionState) -> Result<Vec<Step>> {
    if state != SessionState::LoginRedir {
        return Err(ProtocolError::InvalidState {
            state,
            reason: constants::ERR_NOT_REDIRECTED,
        });
    }

    Ok(vec![
        Step::Send(Message::LoginContinue { data: Bytes::new() }),
        enter(SessionState::LoginCont),
    ])
}

/// Client version from the properties, falling back to the built-in version.
pub fn client_version(props: &Properties) -> Version {
    Version::new(
        props.u16_or(property::CLIENT_VER_MAJOR, CLIENT_VERSION.major),
        props.u16_or(property::CLIENT_VER_MINOR, CLIENT_VERSION.minor),
    )
}

/// Build the HANDSHAKE. The host name is only sent by clients new enough to
/// carry it.
pub fn build_handshake(props: &Properties) -> Handshake {
    let version = client_version(props);
    let local_host = (version >= HANDSHAKE_HOST_VERSION)
        .then(|| props.text(property::CLIENT_HOST).unwrap_or_default().to_string());
    Handshake {
        version,
        server_addr: 0,
        client_type: props.u16_or(property::CLIENT_TYPE, DEFAULT_CLIENT_TYPE),
        local_addr: props.int(property::CLIENT_IP).unwrap_or(0),
        local_host,
    }
}

/// Build a LOGIN from the stored credentials. A token, when present, takes
/// precedence over the password.
pub fn build_login(props: &Properties, challenge: Bytes) -> Login {
    let (auth_type, auth_data) = match props.bytes(property::AUTH_TOKEN) {
        Some(token) => (AuthType::Token, Bytes::copy_from_slice(token)),
        None => (
            AuthType::Plain,
            Bytes::copy_from_slice(props.bytes(property::AUTH_PASSWORD).unwrap_or_default()),
        ),
    };

    Login {
        login_type: props.u16_or(property::CLIENT_TYPE, DEFAULT_CLIENT_TYPE),
        user_id: props
            .text(property::AUTH_USER_ID)
            .unwrap_or_default()
            .to_string(),
        auth_type,
        auth_data,
        challenge,
    }
}

fn record_server_version(props: &mut Properties, ack: &HandshakeAck) {
    debug!(server_version = %ack.version, "Handshake acknowledged");
    props.set(property::SERVER_VER_MAJOR, ack.version.major.into());
    props.set(property::SERVER_VER_MINOR, ack.version.minor.into());
}

fn record_login(props: &mut Properties, ack: LoginAck) -> UserStatus {
    debug!(login_id = %ack.login_id, user_id = %ack.user_id, "Login acknowledged");
    props.set(property::LOGIN_ID, PropertyValue::Text(ack.login_id));
    props.set(property::USER_NAME, PropertyValue::Text(ack.user_name));
    if !ack.community.is_empty() {
        props.set(property::COMMUNITY, PropertyValue::Text(ack.community));
    }
    ack.status
}
