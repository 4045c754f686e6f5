#![no_main]

use dagcodec::{Deserializer, Expr, SessionOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut stream = b"DAGX\x01".to_vec();
    stream.extend_from_slice(data);
    let opts = SessionOptions::default().max_depth(4096).max_function_nesting(8);
    let Ok(mut d) = Deserializer::with_options(&stream[..], opts) else {
        return;
    };
    while let Ok(true) = d.has_remaining() {
        if d.unpack::<Expr>().is_err() {
            break;
        }
    }
});
