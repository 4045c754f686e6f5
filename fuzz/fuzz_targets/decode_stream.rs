#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary input must decode or fail cleanly; anything that decodes must re-encode.
    if let Ok(functions) = dagcodec::from_bytes(data) {
        let _ = dagcodec::to_bytes(&functions);
    }
});
