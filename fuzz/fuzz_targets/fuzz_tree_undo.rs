//! Fuzz target for context tree undo.
//!
//! Applies an arbitrary sequence of observations, undoes a suffix of them
//! and checks the tree is restored exactly.

#![no_main]

use arbitrary::Arbitrary;
use ctw_common::Bit;
use ctw_core::{BitModel, ContextTree, Estimator};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Generated(bool),
    Added(Vec<bool>),
}

#[derive(Debug, Arbitrary)]
struct Input {
    deterministic: bool,
    max_depth: Option<u8>,
    prefix: Vec<Op>,
    suffix: Vec<Op>,
}

fn bits(values: &[bool]) -> Vec<Bit> {
    values.iter().copied().map(Bit::from_bool).collect()
}

/// Applies `op`, returning whether it was accepted.
fn apply(tree: &mut ContextTree, op: &Op) -> bool {
    match op {
        Op::Generated(bit) => tree.observe_generated(Bit::from_bool(*bit)).is_ok(),
        Op::Added(values) => {
            tree.observe_added(&bits(values));
            true
        }
    }
}

fuzz_target!(|input: Input| {
    let estimator = if input.deterministic {
        Estimator::Deterministic
    } else {
        Estimator::Kt
    };
    let max_depth = input.max_depth.map(|d| usize::from(d % 32));
    let mut tree = ContextTree::with_max_depth(estimator, max_depth);

    for op in &input.prefix {
        apply(&mut tree, op);
    }
    let checkpoint = tree.clone();

    let mut applied = Vec::new();
    for op in &input.suffix {
        let before = tree.clone();
        if apply(&mut tree, op) {
            applied.push(op);
        } else {
            assert_eq!(tree, before, "rejected observation changed the tree");
        }
    }
    for op in applied.into_iter().rev() {
        match op {
            Op::Generated(_) => tree.undo_last_generated().unwrap(),
            Op::Added(values) => tree.undo_added(values.len()).unwrap(),
        }
    }
    assert_eq!(tree, checkpoint);
});
