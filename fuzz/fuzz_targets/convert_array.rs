#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(list) = std::str::from_utf8(data) {
        let _ = ab2cb::convert_array(list.lines(), Some(100));
    }
});
