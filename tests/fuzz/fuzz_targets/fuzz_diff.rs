#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Diff classification must not panic on any input.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = covgate::changes::classify_diff(s);
        let _ = covgate::changes::parse_name_status(s);
    }
});
