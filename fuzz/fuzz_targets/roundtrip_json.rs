#![no_main]
use libfuzzer_sys::fuzz_target;
use protodyn::{catalog, json, JsonOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let opts = JsonOptions::default();
        for name in catalog::message_names() {
            let Some(schema) = catalog::lookup(name) else { continue };
            if let Ok(msg) = json::from_json(text, &schema, &opts) {
                let _ = json::to_json(&msg, &opts);
            }
        }
    }
});
