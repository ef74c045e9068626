#![no_main]

use libfuzzer_sys::fuzz_target;

use rtugen::{compile, Specification};

fuzz_target!(|data: &[u8]| {
    let raw = match std::str::from_utf8(data) {
        Ok(raw) => raw,
        Err(_err) => return,
    };

    if let Ok(spec) = serde_json::from_str::<Specification>(raw) {
        let _ = compile(&spec);
    }
});
