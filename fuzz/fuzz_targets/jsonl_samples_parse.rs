//! Fuzz target for the JSON Lines sample reader.
//!
//! Feeds arbitrary UTF-8 text to the reader, checking for panics, crashes,
//! or hangs.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use labelship::source::jsonl::from_jsonl_str;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = from_jsonl_str(text, Path::new("images"));
});
