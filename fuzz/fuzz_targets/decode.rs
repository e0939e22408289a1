#![no_main]
use libfuzzer_sys::fuzz_target;
use protodyn::{catalog, codec, text_format};

fuzz_target!(|data: &[u8]| {
    let _ = text_format::decode_raw(data);
    for name in catalog::message_names() {
        let Some(schema) = catalog::lookup(name) else { continue };
        if let Ok(msg) = codec::decode(data, &schema) {
            // Alles was dekodiert, muss sich stabil neu kodieren lassen.
            let bytes = codec::encode(&msg).expect("re-encode");
            let again = codec::decode(&bytes, &schema).expect("decode re-encoded");
            assert_eq!(again, msg);
        }
    }
});
