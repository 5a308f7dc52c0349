#![no_main]

use libfuzzer_sys::fuzz_target;
use meanwhile::session::{property, Session, SessionHandler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closes);
    let handler = SessionHandler::new()
        .on_io_write(|_| Ok(()))
        .on_io_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let Ok(mut session) = Session::new(handler) else {
        return;
    };
    let _ = session.set_property(property::AUTH_USER_ID, "fuzz".into());
    let _ = session.start();

    // Feed the input in uneven chunks, as a socket would
    for chunk in data.chunks(13) {
        if session.receive(chunk).is_err() {
            break;
        }
    }
    drop(session);

    assert!(closes.load(Ordering::SeqCst) <= 1);
});
