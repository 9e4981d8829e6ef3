//! Fuzz target for context selection.
//!
//! Tests that `select_tree` handles arbitrary histories and target
//! positions without panicking.

#![no_main]

use arbitrary::Arbitrary;
use ctw_common::Bit;
use ctw_core::{select_tree, MissingContext, SelectionOptions};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    history: Vec<bool>,
    positions: Vec<u16>,
    min_relative_index: Option<i8>,
    max_depth: Option<u8>,
    policy: u8,
}

fuzz_target!(|input: Input| {
    let history: Vec<Bit> = input.history.iter().copied().map(Bit::from_bool).collect();
    let positions: Vec<usize> = input.positions.iter().map(|&p| usize::from(p)).collect();
    let options = SelectionOptions {
        min_relative_index: input
            .min_relative_index
            .map(|i| -isize::from(i).abs().max(1)),
        max_depth: input.max_depth.map(usize::from),
        missing_context: match input.policy % 3 {
            0 => MissingContext::BothBranches,
            1 => MissingContext::Exclude,
            _ => MissingContext::ImputeZero,
        },
    };
    if let Some(tree) = select_tree(&history, &positions, &options) {
        assert!(tree.index() < 0);
    }
});
