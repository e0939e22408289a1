#![no_main]
use libfuzzer_sys::fuzz_target;
use protodyn::{catalog, codec, text_format};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        for name in catalog::message_names() {
            let Some(schema) = catalog::lookup(name) else { continue };
            if let Ok(msg) = text_format::from_text(text, &schema) {
                let _ = codec::encode(&msg);
                let _ = text_format::from_text(&text_format::to_text(&msg), &schema);
            }
        }
    }
});
