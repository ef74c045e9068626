#![no_main]

use libfuzzer_sys::fuzz_target;

use rtugen::spec::parse_device_address;

fuzz_target!(|data: &[u8]| {
    let key = match std::str::from_utf8(data) {
        Ok(key) => key,
        Err(_err) => return,
    };

    if let Ok(address) = parse_device_address(key) {
        // a parsed address always round-trips through its decimal form
        assert_eq!(parse_device_address(&format!("{address}")), Ok(address));
    }
});
