#![no_main]

use libfuzzer_sys::fuzz_target;
use lctrace::decoders::text::{decode_bytes, first_cell, parse_pair};

fuzz_target!(|data: &[u8]| {
    // Any byte soup must either decode or be rejected, never panic
    let Some(text) = decode_bytes(data) else {
        return;
    };

    for line in text.lines().take(10_000) {
        let _ = first_cell(line);
        let _ = parse_pair(line);
    }
});
