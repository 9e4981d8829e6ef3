//! Context-tree weighting (CTW) over a single bit stream.
//!
//! The tree holds one node per context seen so far. Each generated bit
//! updates the nodes on its context path, deepest first, and the root's
//! weighted log-probability is the log-probability of everything generated.
//!
//! # Algorithm
//!
//! ```text
//! Pe(node)   = estimator probability of the bits seen in this context
//! Pw(leaf)   = Pe(leaf)
//! Pw(node)   = 1/2 * Pe(node) + 1/2 * Pw(child0) * Pw(child1) * (1/2)^uncovered
//! ```
//!
//! A node is a leaf while it has no child and no uncovered bit. The deepest
//! node of an incomplete context (one that ran out of history before
//! reaching the depth limit) folds one uncovered bit per history generation.
//!
//! Estimates grow by one [`Estimator::log_update`] term per bit, which keeps
//! their precision on long inputs. Each observation journals the estimates it
//! overwrote, so undo restores every node bit-for-bit.

mod node;

pub use node::ContextNode;

use node::{debug_check_log_p, split_log_p, weigh, Fold, NodeId, ROOT};

use crate::extract::{Extractor, SuffixExtractor};
use crate::modeling::BitModel;
use ctw_common::{Bit, Error, Result};
use ctw_math::Estimator;
use std::ops::Deref;
use tracing::{debug, trace};

/// Undo record of one generated bit.
#[derive(Debug, Clone, PartialEq)]
struct Observation {
    position: usize,
    fold: Option<Fold>,
    /// `log_p_estim` of each path node before the update, root first.
    saved: Vec<f64>,
}

/// Incremental CTW model.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTree {
    estimator: Estimator,
    extractor: Extractor,
    nodes: Vec<ContextNode>,
    history: Vec<Bit>,
    generation: u64,
    journal: Vec<Observation>,
}

impl ContextTree {
    pub fn new(estimator: Estimator, extractor: impl Into<Extractor>) -> Self {
        Self {
            estimator,
            extractor: extractor.into(),
            nodes: vec![ContextNode::default()],
            history: Vec::new(),
            generation: 0,
            journal: Vec::new(),
        }
    }

    /// Plain-suffix model; `None` means unbounded depth.
    pub fn with_max_depth(estimator: Estimator, max_depth: Option<usize>) -> Self {
        Self::new(estimator, SuffixExtractor::new(max_depth))
    }

    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Bits observed since the last history switch, oldest first.
    pub fn history(&self) -> &[Bit] {
        &self.history
    }

    /// Generated bits absorbed by the tree over its whole lifetime.
    pub fn generated_count(&self) -> u64 {
        let counts = self.nodes[ROOT].counts;
        counts[0] + counts[1]
    }

    pub fn root(&self) -> NodeView<'_> {
        NodeView {
            tree: self,
            id: ROOT,
        }
    }

    /// Materialized nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of history switches so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// P(next generated bit = `bit` | history).
    pub fn predict(&self, bit: Bit) -> f64 {
        let before = self.history_log_probability();
        let after = self.log_pw_after(bit);
        (after - before).exp().clamp(0.0, 1.0)
    }

    /// Fails unless the last `n` bits of history are all added bits.
    pub(crate) fn check_undo_added(&self, n: usize) -> Result<()> {
        let available = self.history.len();
        if n > available {
            return Err(Error::NothingToUndo {
                requested: n,
                available,
            });
        }
        let cut = available - n;
        if self.journal.last().is_some_and(|last| last.position >= cut) {
            return Err(Error::UndoMismatch(format!(
                "one of the last {n} bits was generated, undo it with undo_last_generated"
            )));
        }
        Ok(())
    }

    /// Current context as a root-first path, and whether it is complete.
    fn context_path(&self, history: &[Bit]) -> (Vec<Bit>, bool) {
        let context = self.extractor.extract_context(history);
        let complete = self.extractor.is_complete(context.len());
        (context.into_iter().rev().collect(), complete)
    }

    fn child_or_insert(&mut self, parent: NodeId, bit: Bit) -> NodeId {
        if let Some(child) = self.nodes[parent].children[bit.index()] {
            return child;
        }
        let child = self.nodes.len();
        self.nodes.push(ContextNode::default());
        self.nodes[parent].children[bit.index()] = Some(child);
        child
    }

    fn children_log_pw(&self, node: &ContextNode) -> [f64; 2] {
        node.children
            .map(|child| child.map_or(0.0, |id| self.nodes[id].log_pw))
    }

    /// Recomputes a node's weighted probability from its estimate, uncovered
    /// bits and children.
    fn refresh(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let split = (node.has_children() || node.uncovered > 0)
            .then(|| split_log_p(self.children_log_pw(node), node.uncovered));
        let log_pw = weigh(node.log_p_estim, split);
        debug_check_log_p(log_pw);
        self.nodes[id].log_pw = log_pw;
    }

    /// Root `log_pw` if `bit` were generated next, computed without mutation.
    ///
    /// Mirrors the update in [`BitModel::observe_generated`] value for value.
    fn log_pw_after(&self, bit: Bit) -> f64 {
        let (path, complete) = self.context_path(&self.history);

        let mut ids: Vec<Option<NodeId>> = Vec::with_capacity(path.len() + 1);
        let mut current = Some(ROOT);
        ids.push(current);
        for &branch in &path {
            current = current.and_then(|id| self.nodes[id].children[branch.index()]);
            ids.push(current);
        }

        let fresh = ContextNode::default();
        let mut below: Option<f64> = None;
        for depth in (0..ids.len()).rev() {
            let node = ids[depth].map_or(&fresh, |id| &self.nodes[id]);

            let log_p_estim =
                node.log_p_estim + self.estimator.log_update(bit.index(), node.counts);

            let mut uncovered = node.uncovered;
            if below.is_none()
                && !complete
                && node.uncovered_generation != Some(self.generation)
            {
                uncovered += 1;
            }

            let mut child_log_pw = self.children_log_pw(node);
            let mut has_children = node.has_children();
            if let Some(log_pw) = below {
                child_log_pw[path[depth].index()] = log_pw;
                has_children = true;
            }

            let split =
                (has_children || uncovered > 0).then(|| split_log_p(child_log_pw, uncovered));
            below = Some(weigh(log_p_estim, split));
        }
        below.unwrap_or(0.0)
    }
}

impl BitModel for ContextTree {
    fn observe_generated(&mut self, bit: Bit) -> Result<()> {
        let position = self.history.len();
        let (path, complete) = self.context_path(&self.history);

        let mut ids = Vec::with_capacity(path.len() + 1);
        let mut id = ROOT;
        ids.push(id);
        for &branch in &path {
            id = self.child_or_insert(id, branch);
            ids.push(id);
        }

        let fold = if complete {
            None
        } else {
            self.nodes[id].fold_uncovered(self.generation)
        };
        let estimator = self.estimator;
        let saved = ids.iter().map(|&id| self.nodes[id].log_p_estim).collect();
        for &id in ids.iter().rev() {
            let node = &mut self.nodes[id];
            node.log_p_estim += estimator.log_update(bit.index(), node.counts);
            node.counts[bit.index()] += 1;
            self.refresh(id);
        }

        self.history.push(bit);
        self.journal.push(Observation {
            position,
            fold,
            saved,
        });

        let root = self.history_log_probability();
        trace!(%bit, position, depth = path.len(), log_pw = root, "observed generated bit");

        if root == f64::NEG_INFINITY {
            self.undo_last_generated()?;
            debug!(%bit, position, "generated bit has zero probability, rolled back");
            return Err(Error::ImpossibleHistory { position });
        }
        Ok(())
    }

    fn observe_added(&mut self, bits: &[Bit]) {
        self.history.extend_from_slice(bits);
        trace!(count = bits.len(), len = self.history.len(), "observed added bits");
    }

    fn predict_next(&self) -> f64 {
        self.predict(Bit::One)
    }

    fn undo_last_generated(&mut self) -> Result<()> {
        if self.history.is_empty() {
            return Err(Error::NothingToUndo {
                requested: 1,
                available: 0,
            });
        }
        let last = match self.journal.last() {
            Some(last) if last.position + 1 == self.history.len() => last.clone(),
            _ => {
                return Err(Error::UndoMismatch(
                    "the newest bit was added, undo it with undo_added".to_string(),
                ))
            }
        };

        let position = last.position;
        let bit = self.history[position];
        let (path, _) = self.context_path(&self.history[..position]);
        if path.len() + 1 != last.saved.len() {
            return Err(Error::UndoMismatch(format!(
                "context of position {position} changed since it was observed"
            )));
        }

        let mut ids = Vec::with_capacity(path.len() + 1);
        let mut id = ROOT;
        ids.push(id);
        for &branch in &path {
            let Some(child) = self.nodes[id].children[branch.index()] else {
                return Err(Error::UndoMismatch(format!(
                    "no node for the context of position {position}"
                )));
            };
            id = child;
            ids.push(id);
        }

        self.journal.pop();
        self.history.truncate(position);
        if let Some(fold) = last.fold {
            self.nodes[id].unfold_uncovered(fold);
        }

        let mut removed = 0;
        for depth in (0..ids.len()).rev() {
            let id = ids[depth];
            debug_assert!(self.nodes[id].counts[bit.index()] > 0);
            self.nodes[id].counts[bit.index()] -= 1;
            self.nodes[id].log_p_estim = last.saved[depth];
            if depth > 0 && self.nodes[id].is_empty() {
                self.nodes[ids[depth - 1]].children[path[depth - 1].index()] = None;
                removed += 1;
            } else {
                self.refresh(id);
            }
        }

        // Nodes emptied by undo were created by the observation being undone,
        // so they sit at the end of the arena.
        let keep = self.nodes.len() - removed;
        debug_assert!(ids[ids.len() - removed..].iter().all(|&id| id >= keep));
        self.nodes.truncate(keep);

        trace!(%bit, position, removed, "undid generated bit");
        Ok(())
    }

    fn undo_added(&mut self, n: usize) -> Result<()> {
        self.check_undo_added(n)?;
        self.history.truncate(self.history.len() - n);
        Ok(())
    }

    fn switch_history(&mut self) {
        self.history.clear();
        self.journal.clear();
        self.generation += 1;
        debug!(generation = self.generation, nodes = self.nodes.len(), "switched history");
    }

    fn history_log_probability(&self) -> f64 {
        self.nodes[ROOT].log_pw
    }
}

/// Read-only view of a node that can follow its children.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    tree: &'a ContextTree,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    pub fn child(&self, bit: Bit) -> Option<NodeView<'a>> {
        self.tree.nodes[self.id].children[bit.index()].map(|id| NodeView {
            tree: self.tree,
            id,
        })
    }
}

impl Deref for NodeView<'_> {
    type Target = ContextNode;

    fn deref(&self) -> &ContextNode {
        &self.tree.nodes[self.id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctw_common::parse_bits;
    use ctw_math::LN_HALF;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn observe_str(tree: &mut ContextTree, bits: &str) {
        tree.observe_generated_all(&parse_bits(bits).unwrap()).unwrap();
    }

    #[test]
    fn empty_tree() {
        let tree = ContextTree::with_max_depth(Estimator::Kt, None);
        assert_eq!(tree.history_log_probability(), 0.0);
        assert_eq!(tree.node_count(), 1);
        assert!(approx_eq(tree.predict_next(), 0.5, 1e-12));
    }

    #[test]
    fn first_bit_has_probability_half() {
        for depth in [None, Some(0), Some(3)] {
            let mut tree = ContextTree::with_max_depth(Estimator::Kt, depth);
            tree.observe_generated(Bit::One).unwrap();
            assert!(approx_eq(tree.history_log_probability(), LN_HALF, 1e-12));
        }
    }

    #[test]
    fn depth_zero_is_a_single_estimator() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, Some(0));
        observe_str(&mut tree, "0110100111");
        let root = tree.root();
        assert!(root.child(Bit::Zero).is_none());
        assert!(root.child(Bit::One).is_none());
        assert_eq!(root.log_pw(), root.log_p_estim());
        assert!(approx_eq(root.log_p_estim(), Estimator::Kt.log_prob([4, 6]), 1e-12));
    }

    #[test]
    fn bounded_depth_limits_the_tree() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, Some(1));
        observe_str(&mut tree, "0110");
        // Root plus one node per context bit value.
        assert_eq!(tree.node_count(), 3);
        let zero = tree.root().child(Bit::Zero).unwrap();
        assert_eq!(zero.counts(), [0, 1]);
        assert!(zero.child(Bit::Zero).is_none());
        assert_eq!(tree.root().uncovered_bits(), 1);
    }

    #[test]
    fn deterministic_boundary() {
        let mut tree = ContextTree::with_max_depth(Estimator::Deterministic, Some(2));
        observe_str(&mut tree, "000");
        assert_eq!(tree.predict_next(), 0.0);

        tree.undo_generated(3).unwrap();
        assert!(approx_eq(tree.predict_next(), 0.5, 1e-12));

        observe_str(&mut tree, "111");
        assert!(approx_eq(tree.predict_next(), 1.0, 1e-12));
    }

    #[test]
    fn impossible_history_leaves_tree_untouched() {
        let mut tree = ContextTree::with_max_depth(Estimator::Deterministic, Some(0));
        observe_str(&mut tree, "00");
        let before = tree.clone();

        let err = tree.observe_generated(Bit::One).unwrap_err();
        assert!(matches!(err, Error::ImpossibleHistory { position: 2 }));
        assert_eq!(tree, before);

        tree.observe_generated(Bit::Zero).unwrap();
    }

    #[test]
    fn undo_restores_exact_state() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, None);
        observe_str(&mut tree, "01101");
        let before = tree.clone();

        observe_str(&mut tree, "1");
        tree.observe_added(&parse_bits("00").unwrap());
        observe_str(&mut tree, "0");

        tree.undo_last_generated().unwrap();
        tree.undo_added(2).unwrap();
        tree.undo_last_generated().unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn undo_prunes_emptied_nodes() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, None);
        observe_str(&mut tree, "01");
        let nodes = tree.node_count();
        observe_str(&mut tree, "1");
        assert!(tree.node_count() > nodes);
        tree.undo_last_generated().unwrap();
        assert_eq!(tree.node_count(), nodes);
    }

    #[test]
    fn undo_kinds_must_match() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, None);
        observe_str(&mut tree, "1");
        tree.observe_added(&[Bit::Zero]);

        assert!(matches!(tree.undo_last_generated(), Err(Error::UndoMismatch(_))));
        assert!(matches!(tree.undo_added(2), Err(Error::UndoMismatch(_))));
        assert!(matches!(
            tree.undo_added(3),
            Err(Error::NothingToUndo {
                requested: 3,
                available: 2
            })
        ));
        tree.undo_added(1).unwrap();
        tree.undo_last_generated().unwrap();
        assert!(matches!(
            tree.undo_last_generated(),
            Err(Error::NothingToUndo { .. })
        ));
    }

    #[test]
    fn switch_keeps_statistics() {
        let mut tree = ContextTree::with_max_depth(Estimator::Deterministic, None);
        observe_str(&mut tree, "01");
        tree.switch_history();
        assert!(tree.history().is_empty());
        assert_eq!(tree.generated_count(), 2);
        assert!(matches!(
            tree.undo_last_generated(),
            Err(Error::NothingToUndo { .. })
        ));

        observe_str(&mut tree, "0");
        assert!(approx_eq(tree.history_log_probability().exp(), 0.0625, 1e-12));
    }

    #[test]
    fn predictions_sum_to_one() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, Some(3));
        observe_str(&mut tree, "0110100111010");
        let total = tree.predict(Bit::Zero) + tree.predict(Bit::One);
        assert!(approx_eq(total, 1.0, 1e-12));
    }

    #[test]
    fn long_history_keeps_predictions_normalized() {
        // Period-three source: deep contexts reach counts in the tens of
        // thousands while the root cost stays small.
        let bits: Vec<Bit> = parse_bits("011")
            .unwrap()
            .into_iter()
            .cycle()
            .take(200_000)
            .collect();
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, Some(4));
        tree.observe_generated_all(&bits).unwrap();

        let total = tree.predict(Bit::Zero) + tree.predict(Bit::One);
        assert!(approx_eq(total, 1.0, 1e-12), "total = {total}");

        // Estimates accumulate exact per-bit terms.
        let mut node = tree.root();
        for branch in [Bit::One, Bit::One] {
            node = node.child(branch).unwrap();
        }
        let replayed: f64 = {
            let mut counts = [0u64; 2];
            let mut log_p = 0.0;
            for _ in 0..node.counts()[0] {
                log_p += Estimator::Kt.log_update(0, counts);
                counts[0] += 1;
            }
            log_p
        };
        assert_eq!(node.counts()[1], 0);
        assert!(approx_eq(node.log_p_estim(), replayed, 1e-9));
    }

    #[test]
    fn undo_restores_estimates_after_a_long_run() {
        let bits: Vec<Bit> = parse_bits("0110")
            .unwrap()
            .into_iter()
            .cycle()
            .take(5_000)
            .collect();
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, Some(3));
        tree.observe_generated_all(&bits).unwrap();
        let before = tree.clone();

        observe_str(&mut tree, "1101");
        tree.undo_generated(4).unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn predict_matches_observe() {
        let mut tree = ContextTree::with_max_depth(Estimator::Kt, None);
        observe_str(&mut tree, "1101");
        let before = tree.history_log_probability();
        let predicted = tree.predict_next();
        tree.observe_generated(Bit::One).unwrap();
        let observed = (tree.history_log_probability() - before).exp();
        assert_eq!(predicted, observed);
    }
}
