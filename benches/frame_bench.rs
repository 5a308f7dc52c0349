use bytes::{Bytes, BytesMut};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use meanwhile::core::codec::FrameCodec;
use meanwhile::protocol::message::{
    HandshakeAck, HandshakeAckExt, LoginAck, Message, StatusKind, UserStatus, Version,
};
use meanwhile::session::{property, PropertyValue, Session, SessionHandler};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_frame_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode_decode");
    let body_sizes = [64usize, 512, 4096, 65536];

    for &size in &body_sizes {
        let message = Message::ChannelSend {
            channel: 0x10,
            body: Bytes::from(vec![0u8; size]),
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            let mut codec = FrameCodec::new();
            b.iter_batched(
                || BytesMut::with_capacity(size + 16),
                |mut buf| codec.encode(&message, &mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("decode_{size}b"), |b| {
            let mut encoded = BytesMut::new();
            FrameCodec::new().encode(&message, &mut encoded).unwrap();
            let encoded = encoded.freeze();
            let mut codec = FrameCodec::new();
            b.iter_batched(
                || BytesMut::from(&encoded[..]),
                |mut buf| {
                    let frame = codec.decode(&mut buf).unwrap();
                    assert!(frame.is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_session_login(c: &mut Criterion) {
    let mut server = BytesMut::new();
    let mut codec = FrameCodec::new();
    codec
        .encode(
            &Message::HandshakeAck(HandshakeAck {
                version: Version::new(0x001e, 0x001d),
                server_addr: 0,
                extension: Some(HandshakeAckExt::default()),
            }),
            &mut server,
        )
        .unwrap();
    codec
        .encode(
            &Message::LoginAck(LoginAck {
                login_id: "0001".into(),
                login_type: 0x1700,
                user_id: "alice".into(),
                user_name: "Alice".into(),
                community: String::new(),
                status: UserStatus {
                    status: StatusKind::Active,
                    time: 0,
                    description: String::new(),
                },
            }),
            &mut server,
        )
        .unwrap();
    let server = server.freeze();

    c.bench_function("session_login", |b| {
        b.iter(|| {
            let handler = SessionHandler::new()
                .on_io_write(|_| Ok(()))
                .on_io_close(|| {});
            let mut session = Session::new(handler).unwrap();
            session
                .set_property(property::AUTH_USER_ID, "alice".into())
                .unwrap();
            session
                .set_property(property::AUTH_PASSWORD, PropertyValue::secret("hunter2"))
                .unwrap();
            session.start().unwrap();
            session.receive(&server).unwrap();
        })
    });
}

criterion_group!(benches, bench_frame_encode_decode, bench_session_login);
criterion_main!(benches);
