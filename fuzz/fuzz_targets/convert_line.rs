#![no_main]

use ab2cb::{ContentBlockerConverter, ConvertOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let converter = ContentBlockerConverter::new(ConvertOptions::default());
        let _ = converter.convert_line(line);
    }
});
