#![no_main]

use libfuzzer_sys::fuzz_target;

use rtugen::{compile, Emitter, Specification};

fuzz_target!(|spec: Specification| {
    // compilation either succeeds or raises a diagnostic, never panics;
    // successful programs must render and re-render identically
    if let Ok(program) = compile(&spec) {
        let emitter = Emitter::new();
        assert_eq!(emitter.render(&program), emitter.render(&program));
    }
});
