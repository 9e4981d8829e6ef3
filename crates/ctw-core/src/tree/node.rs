//! Context tree nodes and the weighting rule.
//!
//! Nodes live in an arena owned by [`super::ContextTree`]; a parent refers to
//! its children by arena index. Every path is walked root-to-leaf from a
//! freshly extracted context, so no back-references are needed.

use ctw_math::{log_mean_exp, LN_HALF};

/// Arena index of a node. The root is always [`ROOT`].
pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

/// One context: the statistics of the generated bits that followed it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextNode {
    pub(crate) counts: [u64; 2],
    pub(crate) log_p_estim: f64,
    pub(crate) log_pw: f64,
    pub(crate) uncovered: u32,
    pub(crate) uncovered_generation: Option<u64>,
    pub(crate) children: [Option<NodeId>; 2],
}

/// Undo record for one uncovered-bit fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fold {
    previous: Option<u64>,
}

impl ContextNode {
    pub fn counts(&self) -> [u64; 2] {
        self.counts
    }

    pub fn log_p_estim(&self) -> f64 {
        self.log_p_estim
    }

    pub fn log_pw(&self) -> f64 {
        self.log_pw
    }

    /// `uncovered * ln(1/2)`: the mass not yet handed to a child context.
    pub fn log_p_uncovered(&self) -> f64 {
        uncovered_log_p(self.uncovered)
    }

    pub fn uncovered_bits(&self) -> u32 {
        self.uncovered
    }

    pub fn is_empty(&self) -> bool {
        self.counts == [0, 0]
    }

    pub(crate) fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    /// Folds one uncovered bit into this node, at most once per generation.
    pub(crate) fn fold_uncovered(&mut self, generation: u64) -> Option<Fold> {
        if self.uncovered_generation == Some(generation) {
            return None;
        }
        let previous = self.uncovered_generation.replace(generation);
        self.uncovered += 1;
        Some(Fold { previous })
    }

    pub(crate) fn unfold_uncovered(&mut self, fold: Fold) {
        debug_assert!(self.uncovered > 0, "unfolding a node with no uncovered bits");
        self.uncovered -= 1;
        self.uncovered_generation = fold.previous;
    }
}

pub(crate) fn uncovered_log_p(uncovered: u32) -> f64 {
    f64::from(uncovered) * LN_HALF
}

/// Log-probability of the "split" hypothesis: the children explain the bits,
/// except the uncovered ones which are charged one half each.
pub(crate) fn split_log_p(child_log_pw: [f64; 2], uncovered: u32) -> f64 {
    child_log_pw[0] + child_log_pw[1] + uncovered_log_p(uncovered)
}

/// The CTW weighting rule. A node with nothing to split over is a leaf.
pub(crate) fn weigh(log_p_estim: f64, split: Option<f64>) -> f64 {
    match split {
        Some(split) => log_mean_exp(log_p_estim, split),
        None => log_p_estim,
    }
}

/// Debug-only check that a weighted log-probability is a probability.
pub(crate) fn debug_check_log_p(log_p: f64) {
    debug_assert!(!log_p.is_nan(), "weighted probability is NaN");
    debug_assert!(log_p <= 1e-9, "weighted probability exceeds one: ln p = {log_p}");
}
