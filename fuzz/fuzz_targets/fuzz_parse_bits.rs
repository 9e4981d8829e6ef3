//! Fuzz target for bit-string parsing and byte packing.
//!
//! Tests that `parse_bits` and `to_bytes` handle arbitrary input without
//! panicking, and that accepted strings format back to themselves.

#![no_main]

use ctw_common::{format_bits, parse_bits, to_bits, to_bytes};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(bits) = parse_bits(data) else {
        return;
    };
    assert_eq!(format_bits(&bits), data);
    if let Ok(bytes) = to_bytes(&bits) {
        assert_eq!(to_bits(&bytes), bits);
    }
});
