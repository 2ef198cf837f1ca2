//! Fuzz target for the TFOD CSV sample reader.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use labelship::source::tfod_csv::from_tfod_csv_str;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = from_tfod_csv_str(text, Path::new(""));
});
