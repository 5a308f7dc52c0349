//! Typed protocol messages and their binary bodies.
//!
//! Every message starts with the same eight byte header:
//!
//! ```text
//! [Type(2)] [Options(2)] [Channel(4)] [Attribs?] [Body(N)]
//! ```
//!
//! When `options & 0x8000` is set an opaque attribute block follows the header.
//! It is skipped on decode and never produced on encode. Bytes left over after a
//! known body are ignored so newer servers can append fields. Optional trailing
//! fields (the handshake host, the handshake ack extension and the login
//! challenge) are read whenever bytes remain for them.

use crate::core::wire;
use crate::error::{constants, ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Option bit announcing an attribute block after the header.
pub const OPTION_HAS_ATTRIBS: u16 = 0x8000;

/// Channel id of the session's own control channel.
pub const MASTER_CHANNEL: u32 = 0;

/// Size of the fixed message header.
pub const HEADER_LEN: usize = 8;

/// Message type tags as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Handshake = 0x0000,
    HandshakeAck = 0x8000,
    Login = 0x0001,
    LoginAck = 0x8001,
    LoginRedirect = 0x0018,
    LoginContinue = 0x0016,
    ChannelCreate = 0x0002,
    ChannelDestroy = 0x0003,
    ChannelSend = 0x0004,
    ChannelAccept = 0x0006,
    SetUserStatus = 0x0009,
    SetPrivacyList = 0x000b,
    Admin = 0x0019,
}

impl MessageType {
    /// Convert to wire format.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Convert from wire format.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Self::Handshake),
            0x8000 => Some(Self::HandshakeAck),
            0x0001 => Some(Self::Login),
            0x8001 => Some(Self::LoginAck),
            0x0018 => Some(Self::LoginRedirect),
            0x0016 => Some(Self::LoginContinue),
            0x0002 => Some(Self::ChannelCreate),
            0x0003 => Some(Self::ChannelDestroy),
            0x0004 => Some(Self::ChannelSend),
            0x0006 => Some(Self::ChannelAccept),
            0x0009 => Some(Self::SetUserStatus),
            0x000b => Some(Self::SetPrivacyList),
            0x0019 => Some(Self::Admin),
            _ => None,
        }
    }

    /// Opcode name used for routing and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Handshake => "HANDSHAKE",
            Self::HandshakeAck => "HANDSHAKE_ACK",
            Self::Login => "LOGIN",
            Self::LoginAck => "LOGIN_ACK",
            Self::LoginRedirect => "LOGIN_REDIRECT",
            Self::LoginContinue => "LOGIN_CONTINUE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelDestroy => "CHANNEL_DESTROY",
            Self::ChannelSend => "CHANNEL_SEND",
            Self::ChannelAccept => "CHANNEL_ACCEPT",
            Self::SetUserStatus => "SET_USER_STATUS",
            Self::SetPrivacyList => "SET_PRIVACY_LIST",
            Self::Admin => "ADMIN",
        }
    }
}

/// Protocol version pair. Ordering is major first, then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}.{:#06x}", self.major, self.minor)
    }
}

/// Handshakes at or above this version carry the client's host name.
pub const HANDSHAKE_HOST_VERSION: Version = Version::new(0x001e, 0x001d);

/// Handshake acks at or above this version carry a magic value and opaque data.
pub const HANDSHAKE_ACK_EXT_VERSION: Version = Version::new(0x001e, 0x0019);

/// First message a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub version: Version,
    pub server_addr: u32,
    pub client_type: u16,
    pub local_addr: u32,
    /// Encoded after two reserved fields when present. Clients at or above
    /// `HANDSHAKE_HOST_VERSION` always send it, even when empty.
    pub local_host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeAck {
    pub version: Version,
    pub server_addr: u32,
    /// Sent by servers at or above `HANDSHAKE_ACK_EXT_VERSION`.
    pub extension: Option<HandshakeAckExt>,
}

/// Trailing fields of a newer handshake ack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeAckExt {
    pub magic: u32,
    pub data: Bytes,
}

/// How `Login::auth_data` is to be interpreted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AuthType {
    Plain = 0x0000,
    Token = 0x0001,
    Encrypted = 0x0002,
}

impl AuthType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Self::Plain),
            0x0001 => Some(Self::Token),
            0x0002 => Some(Self::Encrypted),
            _ => None,
        }
    }
}

/// Login request. `auth_data` carries the credential and is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub login_type: u16,
    pub user_id: String,
    pub auth_type: AuthType,
    pub auth_data: Bytes,
    /// Challenge data echoed back after a LOGIN_CONTINUE. Omitted when empty.
    pub challenge: Bytes,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("login_type", &self.login_type)
            .field("user_id", &self.user_id)
            .field("auth_type", &self.auth_type)
            .field("auth_data", &"<redacted>")
            .field("challenge_len", &self.challenge.len())
            .finish()
    }
}

/// Presence status codes.
///
/// Equality compares wire codes, so `Other(0x0020)` equals `Active`.
#[derive(Debug, Clone, Copy)]
pub enum StatusKind {
    Active,
    Idle,
    Away,
    Busy,
    Other(u16),
}

impl StatusKind {
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Active => 0x0020,
            Self::Idle => 0x0040,
            Self::Away => 0x0060,
            Self::Busy => 0x0080,
            Self::Other(code) => code,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0020 => Self::Active,
            0x0040 => Self::Idle,
            0x0060 => Self::Away,
            0x0080 => Self::Busy,
            other => Self::Other(other),
        }
    }
}

impl PartialEq for StatusKind {
    fn eq(&self, other: &Self) -> bool {
        self.to_u16() == other.to_u16()
    }
}

impl Eq for StatusKind {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStatus {
    pub status: StatusKind,
    /// Seconds since the status was set, as reported by the server.
    pub time: u32,
    pub description: String,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self {
            status: StatusKind::Active,
            time: 0,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAck {
    pub login_id: String,
    pub login_type: u16,
    pub user_id: String,
    pub user_name: String,
    pub community: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// Target host, optionally with a `:port` suffix.
    pub host: String,
    pub server_id: String,
}

/// Privacy list: when `deny` is set the listed users are blocked, otherwise
/// only the listed users are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivacyInfo {
    pub deny: bool,
    pub users: Vec<String>,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Handshake(Handshake),
    HandshakeAck(HandshakeAck),
    Login(Login),
    LoginAck(LoginAck),
    LoginRedirect(LoginRedirect),
    LoginContinue { data: Bytes },
    ChannelCreate { channel: u32, body: Bytes },
    ChannelDestroy { channel: u32, reason: u32, data: Bytes },
    ChannelSend { channel: u32, body: Bytes },
    ChannelAccept { channel: u32, body: Bytes },
    SetUserStatus(UserStatus),
    SetPrivacyList(PrivacyInfo),
    Admin { text: String },
}

impl Message {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Handshake(_) => MessageType::Handshake,
            Message::HandshakeAck(_) => MessageType::HandshakeAck,
            Message::Login(_) => MessageType::Login,
            Message::LoginAck(_) => MessageType::LoginAck,
            Message::LoginRedirect(_) => MessageType::LoginRedirect,
            Message::LoginContinue { .. } => MessageType::LoginContinue,
            Message::ChannelCreate { .. } => MessageType::ChannelCreate,
            Message::ChannelDestroy { .. } => MessageType::ChannelDestroy,
            Message::ChannelSend { .. } => MessageType::ChannelSend,
            Message::ChannelAccept { .. } => MessageType::ChannelAccept,
            Message::SetUserStatus(_) => MessageType::SetUserStatus,
            Message::SetPrivacyList(_) => MessageType::SetPrivacyList,
            Message::Admin { .. } => MessageType::Admin,
        }
    }

    /// Channel the message travels on. Session-level messages use the master channel.
    pub fn channel(&self) -> u32 {
        match self {
            Message::ChannelCreate { channel, .. }
            | Message::ChannelDestroy { channel, .. }
            | Message::ChannelSend { channel, .. }
            | Message::ChannelAccept { channel, .. } => *channel,
            _ => MASTER_CHANNEL,
        }
    }

    /// Exact number of bytes `encode` appends.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + match self {
                Message::Handshake(hs) => {
                    14 + hs
                        .local_host
                        .as_deref()
                        .map_or(0, |host| 6 + wire::string_len(host))
                }
                Message::HandshakeAck(ack) => {
                    8 + ack
                        .extension
                        .as_ref()
                        .map_or(0, |ext| 4 + wire::opaque_len(&ext.data))
                }
                Message::Login(login) => {
                    4 + wire::string_len(&login.user_id)
                        + wire::opaque_len(&login.auth_data)
                        + if login.challenge.is_empty() {
                            0
                        } else {
                            wire::opaque_len(&login.challenge)
                        }
                }
                Message::LoginAck(ack) => {
                    2 + wire::string_len(&ack.login_id)
                        + wire::string_len(&ack.user_id)
                        + wire::string_len(&ack.user_name)
                        + wire::string_len(&ack.community)
                        + status_len(&ack.status)
                }
                Message::LoginRedirect(redir) => {
                    wire::string_len(&redir.host) + wire::string_len(&redir.server_id)
                }
                Message::LoginContinue { data } => wire::opaque_len(data),
                Message::ChannelCreate { body, .. }
                | Message::ChannelSend { body, .. }
                | Message::ChannelAccept { body, .. } => body.len(),
                Message::ChannelDestroy { data, .. } => 4 + wire::opaque_len(data),
                Message::SetUserStatus(status) => status_len(status),
                Message::SetPrivacyList(info) => {
                    5 + info.users.iter().map(|u| wire::string_len(u)).sum::<usize>()
                }
                Message::Admin { text } => wire::string_len(text),
            }
    }

    /// Append the header and body to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u16(self.msg_type().to_u16());
        dst.put_u16(0);
        dst.put_u32(self.channel());

        match self {
            Message::Handshake(hs) => {
                dst.put_u16(hs.version.major);
                dst.put_u16(hs.version.minor);
                dst.put_u32(hs.server_addr);
                dst.put_u16(hs.client_type);
                dst.put_u32(hs.local_addr);
                if let Some(host) = &hs.local_host {
                    // two reserved fields, always zero on send
                    dst.put_u16(0);
                    dst.put_u32(0);
                    wire::put_string(dst, host);
                }
            }
            Message::HandshakeAck(ack) => {
                dst.put_u16(ack.version.major);
                dst.put_u16(ack.version.minor);
                dst.put_u32(ack.server_addr);
                if let Some(ext) = &ack.extension {
                    dst.put_u32(ext.magic);
                    wire::put_opaque(dst, &ext.data);
                }
            }
            Message::Login(login) => {
                dst.put_u16(login.login_type);
                wire::put_string(dst, &login.user_id);
                dst.put_u16(login.auth_type as u16);
                wire::put_opaque(dst, &login.auth_data);
                if !login.challenge.is_empty() {
                    wire::put_opaque(dst, &login.challenge);
                }
            }
            Message::LoginAck(ack) => {
                wire::put_string(dst, &ack.login_id);
                dst.put_u16(ack.login_type);
                wire::put_string(dst, &ack.user_id);
                wire::put_string(dst, &ack.user_name);
                wire::put_string(dst, &ack.community);
                put_status(dst, &ack.status);
            }
            Message::LoginRedirect(redir) => {
                wire::put_string(dst, &redir.host);
                wire::put_string(dst, &redir.server_id);
            }
            Message::LoginContinue { data } => wire::put_opaque(dst, data),
            Message::ChannelCreate { body, .. }
            | Message::ChannelSend { body, .. }
            | Message::ChannelAccept { body, .. } => dst.put_slice(body),
            Message::ChannelDestroy { reason, data, .. } => {
                dst.put_u32(*reason);
                wire::put_opaque(dst, data);
            }
            Message::SetUserStatus(status) => put_status(dst, status),
            Message::SetPrivacyList(info) => {
                wire::put_bool(dst, info.deny);
                dst.put_u32(info.users.len() as u32);
                for user in &info.users {
                    wire::put_string(dst, user);
                }
            }
            Message::Admin { text } => wire::put_string(dst, text),
        }
    }

    /// Decode one complete message (header included) from `src`.
    pub fn decode(mut src: Bytes) -> Result<Self> {
        if src.len() < HEADER_LEN {
            return Err(ProtocolError::FrameCorrupt(
                constants::ERR_TRUNCATED_HEADER.into(),
            ));
        }

        let raw_type = wire::get_u16(&mut src)?;
        let msg_type = MessageType::from_u16(raw_type).ok_or_else(|| {
            ProtocolError::FrameCorrupt(format!("Unknown message type {raw_type:#06x}"))
        })?;
        let options = wire::get_u16(&mut src)?;
        let channel = wire::get_u32(&mut src)?;
        if options & OPTION_HAS_ATTRIBS != 0 {
            wire::get_opaque(&mut src)?;
        }

        let message = match msg_type {
            MessageType::Handshake => {
                let version = Version::new(wire::get_u16(&mut src)?, wire::get_u16(&mut src)?);
                let server_addr = wire::get_u32(&mut src)?;
                let client_type = wire::get_u16(&mut src)?;
                let local_addr = wire::get_u32(&mut src)?;
                let local_host = if src.is_empty() {
                    None
                } else {
                    wire::get_u16(&mut src)?;
                    wire::get_u32(&mut src)?;
                    Some(wire::get_string(&mut src)?)
                };
                Message::Handshake(Handshake {
                    version,
                    server_addr,
                    client_type,
                    local_addr,
                    local_host,
                })
            }
            MessageType::HandshakeAck => {
                let version = Version::new(wire::get_u16(&mut src)?, wire::get_u16(&mut src)?);
                let server_addr = wire::get_u32(&mut src)?;
                let extension = if src.is_empty() {
                    None
                } else {
                    Some(HandshakeAckExt {
                        magic: wire::get_u32(&mut src)?,
                        data: wire::get_opaque(&mut src)?,
                    })
                };
                Message::HandshakeAck(HandshakeAck {
                    version,
                    server_addr,
                    extension,
                })
            }
            MessageType::Login => {
                let login_type = wire::get_u16(&mut src)?;
                let user_id = wire::get_string(&mut src)?;
                let raw_auth = wire::get_u16(&mut src)?;
                let auth_type = AuthType::from_u16(raw_auth).ok_or_else(|| {
                    ProtocolError::FrameCorrupt(format!("Unknown auth type {raw_auth:#06x}"))
                })?;
                let auth_data = wire::get_opaque(&mut src)?;
                let challenge = if src.is_empty() {
                    Bytes::new()
                } else {
                    wire::get_opaque(&mut src)?
                };
                Message::Login(Login {
                    login_type,
                    user_id,
                    auth_type,
                    auth_data,
                    challenge,
                })
            }
            MessageType::LoginAck => Message::LoginAck(LoginAck {
                login_id: wire::get_string(&mut src)?,
                login_type: wire::get_u16(&mut src)?,
                user_id: wire::get_string(&mut src)?,
                user_name: wire::get_string(&mut src)?,
                community: wire::get_string(&mut src)?,
                status: get_status(&mut src)?,
            }),
            MessageType::LoginRedirect => Message::LoginRedirect(LoginRedirect {
                host: wire::get_string(&mut src)?,
                server_id: wire::get_string(&mut src)?,
            }),
            MessageType::LoginContinue => Message::LoginContinue {
                data: wire::get_opaque(&mut src)?,
            },
            MessageType::ChannelCreate => Message::ChannelCreate { channel, body: src },
            MessageType::ChannelSend => Message::ChannelSend { channel, body: src },
            MessageType::ChannelAccept => Message::ChannelAccept { channel, body: src },
            MessageType::ChannelDestroy => Message::ChannelDestroy {
                channel,
                reason: wire::get_u32(&mut src)?,
                data: wire::get_opaque(&mut src)?,
            },
            MessageType::SetUserStatus => Message::SetUserStatus(get_status(&mut src)?),
            MessageType::SetPrivacyList => {
                let deny = wire::get_bool(&mut src)?;
                let count = wire::get_u32(&mut src)? as usize;
                // every entry takes at least its two byte length prefix
                if count > src.len() / 2 {
                    return Err(ProtocolError::FrameCorrupt(format!(
                        "Privacy list claims {count} entries in {} bytes",
                        src.len()
                    )));
                }
                let mut users = Vec::with_capacity(count);
                for _ in 0..count {
                    users.push(wire::get_string(&mut src)?);
                }
                Message::SetPrivacyList(PrivacyInfo { deny, users })
            }
            MessageType::Admin => Message::Admin {
                text: wire::get_string(&mut src)?,
            },
        };

        Ok(message)
    }
}

fn status_len(status: &UserStatus) -> usize {
    6 + wire::string_len(&status.description)
}

fn put_status(dst: &mut BytesMut, status: &UserStatus) {
    dst.put_u16(status.status.to_u16());
    dst.put_u32(status.time);
    wire::put_string(dst, &status.description);
}

fn get_status(src: &mut Bytes) -> Result<UserStatus> {
    Ok(UserStatus {
        status: StatusKind::from_u16(wire::get_u16(src)?),
        time: wire::get_u32(src)?,
        description: wire::get_string(src)?,
    })
}
