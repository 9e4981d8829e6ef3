//! Fuzz target for model configuration parsing.
//!
//! Tests that JSON model configuration parsing handles arbitrary input
//! without panicking, and that a valid configuration builds a model.

#![no_main]

use ctw_core::ModelConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<ModelConfig>(data) else {
        return;
    };
    // Bound the allocation a fuzzed factor count can request.
    if config.validate().is_ok() && config.factors <= 64 {
        let _ = config.build();
    }
});
