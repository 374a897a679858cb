#![no_main]

use libfuzzer_sys::fuzz_target;
use lf_io::read_json_records;
use lf_join::{MergeHow, merge};

// Input: two JSON record arrays separated by a NUL byte.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some((left, right)) = text.split_once('\0') else {
        return;
    };
    let (Ok(left), Ok(right)) = (read_json_records(left), read_json_records(right)) else {
        return;
    };
    if left.len().saturating_mul(right.len()) > 4_096 {
        return;
    }

    for how in [MergeHow::Inner, MergeHow::Outer] {
        if let Ok(out) = merge(&left, &right, None, how) {
            assert!(out.len() <= left.len() * right.len() + left.len() + right.len());
            let _ = out.to_string();
        }
    }
});
