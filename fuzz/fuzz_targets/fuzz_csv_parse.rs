#![no_main]

use libfuzzer_sys::fuzz_target;
use lf_io::{read_csv_str, write_csv_string};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = read_csv_str(text) else {
        return;
    };

    let written = write_csv_string(&frame).expect("a parsed frame must render");
    let reread = read_csv_str(&written).expect("rendered csv must parse");
    assert_eq!(reread.column_names(), frame.column_names());
    assert_eq!(reread.len(), frame.len());
});
