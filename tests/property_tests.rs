//! Property-based tests using proptest
//!
//! These tests validate framing and session invariants across randomly
//! generated inputs and arbitrary chunking of the byte stream.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use bytes::{Bytes, BytesMut};
use common::*;
use meanwhile::core::frame::{self, Decoded, Frame};
use meanwhile::protocol::message::*;
use meanwhile::session::SessionState;
use meanwhile::FrameCodec;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

fn arb_version() -> impl Strategy<Value = Version> {
    // versions land on both sides of the handshake gates
    (0x001cu16..0x0020, any::<u16>()).prop_map(|(major, minor)| Version::new(major, minor))
}

fn arb_bytes(max: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..max).prop_map(Bytes::from)
}

fn arb_status() -> impl Strategy<Value = UserStatus> {
    (any::<u16>(), any::<u32>(), "[a-z ]{0,32}").prop_map(|(code, time, description)| {
        UserStatus {
            status: StatusKind::Other(code),
            time,
            description,
        }
    })
}

fn arb_login_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (
            arb_version(),
            any::<u32>(),
            any::<u16>(),
            any::<u32>(),
            prop::option::of(".{0,24}"),
        )
            .prop_map(|(version, server_addr, client_type, local_addr, local_host)| {
                Message::Handshake(Handshake {
                    version,
                    server_addr,
                    client_type,
                    local_addr,
                    local_host,
                })
            }),
        (
            arb_version(),
            any::<u32>(),
            prop::option::of((any::<u32>(), arb_bytes(32))),
        )
            .prop_map(|(version, server_addr, extension)| {
                Message::HandshakeAck(HandshakeAck {
                    version,
                    server_addr,
                    extension: extension.map(|(magic, data)| HandshakeAckExt { magic, data }),
                })
            }),
        (
            any::<u16>(),
            "[a-z@.]{0,24}",
            prop_oneof![
                Just(AuthType::Plain),
                Just(AuthType::Token),
                Just(AuthType::Encrypted),
            ],
            arb_bytes(32),
            arb_bytes(32),
        )
            .prop_map(|(login_type, user_id, auth_type, auth_data, challenge)| {
                Message::Login(Login {
                    login_type,
                    user_id,
                    auth_type,
                    auth_data,
                    challenge,
                })
            }),
        (
            ("[0-9a-f-]{0,16}", any::<u16>()),
            ("[a-z]{0,12}", ".{0,24}", "[a-z.]{0,16}"),
            arb_status(),
        )
            .prop_map(
                |((login_id, login_type), (user_id, user_name, community), status)| {
                    Message::LoginAck(LoginAck {
                        login_id,
                        login_type,
                        user_id,
                        user_name,
                        community,
                        status,
                    })
                }
            ),
        ("[a-z0-9.:]{0,32}", "[a-z0-9]{0,8}")
            .prop_map(|(host, server_id)| Message::LoginRedirect(LoginRedirect { host, server_id })),
        arb_bytes(64).prop_map(|data| Message::LoginContinue { data }),
    ]
}

fn arb_channel_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (any::<u32>(), arb_bytes(256)).prop_map(|(channel, body)| Message::ChannelCreate { channel, body }),
        (any::<u32>(), arb_bytes(256)).prop_map(|(channel, body)| Message::ChannelSend { channel, body }),
        (any::<u32>(), arb_bytes(256)).prop_map(|(channel, body)| Message::ChannelAccept { channel, body }),
        (any::<u32>(), any::<u32>(), arb_bytes(64)).prop_map(|(channel, reason, data)| {
            Message::ChannelDestroy {
                channel,
                reason,
                data,
            }
        }),
    ]
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        arb_login_message(),
        arb_channel_message(),
        ".{0,64}".prop_map(|text| Message::Admin { text }),
        arb_status().prop_map(Message::SetUserStatus),
        (any::<bool>(), prop::collection::vec("[a-z]{1,12}", 0..8))
            .prop_map(|(deny, users)| Message::SetPrivacyList(PrivacyInfo { deny, users })),
    ]
}

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        1 => Just(Frame::Keepalive),
        4 => arb_message().prop_map(Frame::Message),
    ]
}

fn chunked<'a>(bytes: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| &bytes[w[0]..w[1]]).collect()
}

// Property: the pure decoder never panics on arbitrary input
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let _ = frame::decode(&data);
    }
}

// Property: the codec never panics and never grows the input on arbitrary bytes
proptest! {
    #[test]
    fn prop_codec_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let mut codec = FrameCodec::with_max_frame_size(4096);
        let mut buffer = BytesMut::from(&data[..]);
        loop {
            match codec.decode(&mut buffer) {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
        prop_assert!(buffer.len() <= data.len());
    }
}

// Property: encoded frames decode to themselves, consuming exactly their bytes
proptest! {
    #[test]
    fn prop_frame_decode_consumes_exactly(f in arb_frame(), trailer in prop::collection::vec(any::<u8>(), 0..16)) {
        let encoded = frame::encode(&f);
        let mut stream = encoded.to_vec();
        stream.extend_from_slice(&trailer);

        match frame::decode(&stream).unwrap() {
            Decoded::Frame(decoded, used) => {
                prop_assert_eq!(decoded, f);
                prop_assert_eq!(used, encoded.len());
            }
            Decoded::Incomplete => prop_assert!(false, "complete frame reported incomplete"),
        }
    }
}

// Property: every message type encodes to exactly encoded_len bytes and decodes to itself
proptest! {
    #[test]
    fn prop_message_roundtrip(msg in arb_message()) {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        prop_assert_eq!(buf.len(), msg.encoded_len());
        let decoded = Message::decode(buf.freeze()).unwrap();
        prop_assert_eq!(decoded, msg);
    }
}

// Property: how the stream is chunked does not change what the codec yields
proptest! {
    #[test]
    fn prop_chunking_is_transparent(
        frames in prop::collection::vec(arb_frame(), 1..12),
        cuts in prop::collection::vec(any::<usize>(), 0..24),
    ) {
        let mut stream = BytesMut::new();
        for f in &frames {
            frame::encode_into(f, &mut stream);
        }

        let mut codec = FrameCodec::new();
        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        for chunk in chunked(&stream, &cuts) {
            buffer.extend_from_slice(chunk);
            while let Some(f) = codec.decode(&mut buffer).unwrap() {
                decoded.push(f);
            }
        }

        prop_assert_eq!(decoded, frames);
        prop_assert!(buffer.is_empty());
    }
}

// Property: a session logs in the same way whatever the chunking of the server's bytes
proptest! {
    #[test]
    fn prop_session_login_independent_of_chunking(
        keepalives in 0usize..4,
        cuts in prop::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut stream = vec![0x80; keepalives];
        stream.extend(wire(handshake_ack()));
        stream.extend(wire(login_ack()));

        let (mut session, rec) = session();
        session.start().unwrap();
        for chunk in chunked(&stream, &cuts) {
            session.receive(chunk).unwrap();
        }

        prop_assert_eq!(session.state(), SessionState::Started);
        prop_assert_eq!(rec.states().len(), 6);
        prop_assert_eq!(rec.closes(), 0);
    }
}

// Property: garbage after the handshake never produces more than one stop
proptest! {
    #[test]
    fn prop_garbage_stops_at_most_once(data in prop::collection::vec(any::<u8>(), 1..512)) {
        let (mut session, rec) = session();
        session.start().unwrap();
        for chunk in data.chunks(7) {
            if session.receive(chunk).is_err() {
                break;
            }
        }

        prop_assert!(rec.closes() <= 1);
        let stops = rec.states().iter().filter(|s| **s == SessionState::Stopped).count();
        prop_assert!(stops <= 1);
        prop_assert_eq!(stops, rec.closes());
    }
}
