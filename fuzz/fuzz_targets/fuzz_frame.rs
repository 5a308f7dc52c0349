#![no_main]

use libfuzzer_sys::fuzz_target;
use meanwhile::core::frame::{self, Decoded};

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must re-encode to a frame that decodes the same way
    if let Ok(Decoded::Frame(decoded, used)) = frame::decode(data) {
        assert!(used <= data.len());
        let encoded = frame::encode(&decoded);
        if let Ok(Decoded::Frame(again, _)) = frame::decode(&encoded) {
            assert_eq!(again, decoded);
        }
    }
});
