//! Greedy context selection.
//!
//! Builds a [`Var`] tree that partitions the target positions by the bit
//! found at a chosen relative offset, one variable at a time. Each split
//! picks the offset whose two partitions have the lowest summed entropy
//! cost, `k * H(m / k)` bits for a partition of `k` positions with `m` ones.
//! This is a local proxy for the model's code length, not an optimal search.

use crate::extract::Var;
use ctw_common::Bit;
use ctw_math::partition_cost_bits;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How a position is partitioned when the candidate offset reaches before
/// the start of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingContext {
    /// Count the position in both partitions (conservative).
    #[default]
    BothBranches,
    /// Leave the position out of both partitions.
    Exclude,
    /// Treat the missing bit as a 0.
    ImputeZero,
}

impl MissingContext {
    pub fn as_str(self) -> &'static str {
        match self {
            MissingContext::BothBranches => "both_branches",
            MissingContext::Exclude => "exclude",
            MissingContext::ImputeZero => "impute_zero",
        }
    }
}

impl std::str::FromStr for MissingContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "both_branches" | "both" => Ok(MissingContext::BothBranches),
            "exclude" => Ok(MissingContext::Exclude),
            "impute_zero" | "zero" => Ok(MissingContext::ImputeZero),
            _ => Err(format!("unknown missing-context policy: {}", s)),
        }
    }
}

impl std::fmt::Display for MissingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    /// Furthest offset to consider (negative). Defaults to the whole history.
    pub min_relative_index: Option<isize>,
    /// Deepest variable level, counting the root as level 0. `Some(0)` still
    /// selects one variable.
    pub max_depth: Option<usize>,
    pub missing_context: MissingContext,
}

/// Selects a variable tree that helps predict the bits at `positions`.
///
/// Returns `None` when there is nothing to predict or no variable lowers
/// the cost.
pub fn select_tree(history: &[Bit], positions: &[usize], options: &SelectionOptions) -> Option<Var> {
    let valid: Vec<usize> = positions
        .iter()
        .copied()
        .filter(|&pos| pos < history.len())
        .collect();
    if valid.len() < positions.len() {
        warn!(
            dropped = positions.len() - valid.len(),
            len = history.len(),
            "ignoring target positions outside the history"
        );
    }
    let first = *valid.first()?;

    let floor = -(history.len() as isize);
    let min_index = options
        .min_relative_index
        .map_or(floor, |index| index.max(floor));
    let candidates: Vec<isize> = (min_index..=-1).rev().collect();

    info!(
        first,
        positions = valid.len(),
        candidates = candidates.len(),
        "building variable tree"
    );
    let tree = TreeBuilder { history, options }.build(&valid, &candidates, 0);
    if let Some(tree) = &tree {
        info!(first, vars = tree.size(), depth = tree.depth(), "selected {}", tree);
    }
    tree
}

struct TreeBuilder<'a> {
    history: &'a [Bit],
    options: &'a SelectionOptions,
}

/// Best variable for one partition.
struct Split {
    index: isize,
    on_zero: Vec<usize>,
    on_one: Vec<usize>,
    cost: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, positions: &[usize], candidates: &[isize], depth: usize) -> Option<Var> {
        if positions.is_empty() || self.options.max_depth.is_some_and(|d| depth > d) {
            return None;
        }

        let current = self.cost(positions);
        let split = self.choose_split(positions, candidates)?;
        if split.cost >= current {
            debug!(depth, cost = current, "no variable lowers the cost");
            return None;
        }
        debug!(depth, index = split.index, cost = split.cost, from = current, "best var");

        let unused: Vec<isize> = candidates
            .iter()
            .copied()
            .filter(|&index| index != split.index)
            .collect();
        let on_zero = self.build(&split.on_zero, &unused, depth + 1);
        let on_one = self.build(&split.on_one, &unused, depth + 1);
        match Var::branch(split.index, on_zero, on_one) {
            Ok(var) => Some(var),
            Err(err) => {
                warn!(%err, "discarding selected variable");
                None
            }
        }
    }

    /// The candidate with the lowest partition cost; ties keep the nearer offset.
    fn choose_split(&self, positions: &[usize], candidates: &[isize]) -> Option<Split> {
        let mut best: Option<Split> = None;
        for &index in candidates {
            let on_zero = self.filter(positions, index, Bit::Zero);
            let on_one = self.filter(positions, index, Bit::One);
            let cost = self.cost(&on_zero) + self.cost(&on_one);
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(Split {
                    index,
                    on_zero,
                    on_one,
                    cost,
                });
            }
        }
        best
    }

    /// Positions whose bit at relative `index` equals `value`.
    fn filter(&self, positions: &[usize], index: isize, value: Bit) -> Vec<usize> {
        positions
            .iter()
            .copied()
            .filter(|&pos| {
                let abs = pos as isize + index;
                if abs < 0 {
                    match self.options.missing_context {
                        MissingContext::BothBranches => true,
                        MissingContext::Exclude => false,
                        MissingContext::ImputeZero => value == Bit::Zero,
                    }
                } else {
                    self.history[abs as usize] == value
                }
            })
            .collect()
    }

    fn cost(&self, positions: &[usize]) -> f64 {
        let ones = positions
            .iter()
            .filter(|&&pos| self.history[pos] == Bit::One)
            .count();
        partition_cost_bits(positions.len(), ones)
    }
}
