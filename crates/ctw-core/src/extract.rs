//! Context extraction: which history bits a context tree conditions on.
//!
//! A context is returned oldest-first; its last element is the bit that
//! selects the root's child. The default [`SuffixExtractor`] uses the most
//! recent bits. A [`VarExtractor`] first walks a tree of selected variables
//! (signed offsets into history) and then fills the remaining slots with the
//! nearest bits not already used.

use ctw_common::{Bit, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node of a variable (selection) tree.
///
/// `index` is a negative offset relative to the bit being predicted
/// (`-1` is the previous bit). The child to follow is chosen by the bit
/// found at that offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVar")]
pub struct Var {
    index: isize,
    children: [Option<Box<Var>>; 2],
}

/// Unchecked wire form of [`Var`].
#[derive(Deserialize)]
struct RawVar {
    index: isize,
    children: [Option<Box<Var>>; 2],
}

impl TryFrom<RawVar> for Var {
    type Error = Error;

    fn try_from(raw: RawVar) -> Result<Self> {
        let [on_zero, on_one] = raw.children;
        Self::branch(raw.index, on_zero.map(|c| *c), on_one.map(|c| *c))
    }
}

impl Var {
    /// A variable with no children.
    pub fn leaf(index: isize) -> Result<Self> {
        Self::branch(index, None, None)
    }

    /// A variable whose children are followed on 0 and on 1 respectively.
    ///
    /// Fails unless `index` points into the past.
    pub fn branch(index: isize, on_zero: Option<Var>, on_one: Option<Var>) -> Result<Self> {
        if index >= 0 {
            return Err(Error::VarOffset { index });
        }
        Ok(Self {
            index,
            children: [on_zero.map(Box::new), on_one.map(Box::new)],
        })
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn child(&self, bit: Bit) -> Option<&Var> {
        self.children[bit.index()].as_deref()
    }

    /// Number of variables in this subtree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().flatten().map(|c| c.size()).sum::<usize>()
    }

    /// Longest root-to-leaf chain of variables.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(|c| c.depth())
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)?;
        if self.children.iter().any(Option::is_some) {
            let show = |child: Option<&Var>| child.map_or_else(|| "_".to_string(), |c| c.to_string());
            write!(f, "({}, {})", show(self.child(Bit::Zero)), show(self.child(Bit::One)))?;
        }
        Ok(())
    }
}

/// Plain suffix context: the last `max_depth` bits (all of them when unset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuffixExtractor {
    max_depth: Option<usize>,
}

impl SuffixExtractor {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn extract_context(&self, history: &[Bit]) -> Vec<Bit> {
        let keep = self.max_depth.map_or(history.len(), |d| d.min(history.len()));
        history[history.len() - keep..].to_vec()
    }
}

/// Context built from a variable tree, then padded with the nearest unused bits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarExtractor {
    root: Option<Var>,
    max_depth: Option<usize>,
}

impl VarExtractor {
    /// `max_depth` bounds the whole context: the variable walk stops there and
    /// the suffix fallback only fills the slots the walk left over.
    pub fn new(root: Option<Var>, max_depth: Option<usize>) -> Self {
        Self { root, max_depth }
    }

    pub fn root(&self) -> Option<&Var> {
        self.root.as_ref()
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn extract_context(&self, history: &[Bit]) -> Vec<Bit> {
        let len = history.len();
        let mut consumed: Vec<usize> = Vec::new();
        let mut selected: Vec<Bit> = Vec::new();

        let mut var = self.root.as_ref();
        while let Some(v) = var {
            if self.max_depth.is_some_and(|d| selected.len() >= d) {
                break;
            }
            let Some(abs) = len.checked_add_signed(v.index).filter(|&abs| abs < len) else {
                break;
            };
            let bit = history[abs];
            consumed.push(abs);
            selected.push(bit);
            var = v.child(bit);
        }

        let slots = self
            .max_depth
            .map_or(usize::MAX, |d| d.saturating_sub(selected.len()));
        let suffix: Vec<Bit> = (0..len)
            .rev()
            .filter(|pos| !consumed.contains(pos))
            .take(slots)
            .map(|pos| history[pos])
            .collect();

        let mut context = Vec::with_capacity(suffix.len() + selected.len());
        context.extend(suffix.iter().rev());
        context.extend(selected.iter().rev());
        context
    }
}

/// The context rule a [`crate::tree::ContextTree`] was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extractor {
    Suffix(SuffixExtractor),
    Vars(VarExtractor),
}

impl Extractor {
    pub fn extract_context(&self, history: &[Bit]) -> Vec<Bit> {
        match self {
            Extractor::Suffix(e) => e.extract_context(history),
            Extractor::Vars(e) => e.extract_context(history),
        }
    }

    pub fn max_depth(&self) -> Option<usize> {
        match self {
            Extractor::Suffix(e) => e.max_depth(),
            Extractor::Vars(e) => e.max_depth(),
        }
    }

    /// Whether a context of this length reached the depth limit.
    ///
    /// The deepest node of a complete context is a leaf of the mixture; an
    /// incomplete one ran out of history and leaves its bit uncovered.
    pub fn is_complete(&self, context_len: usize) -> bool {
        self.max_depth().is_some_and(|d| context_len >= d)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::Suffix(SuffixExtractor::default())
    }
}

impl From<SuffixExtractor> for Extractor {
    fn from(e: SuffixExtractor) -> Self {
        Extractor::Suffix(e)
    }
}

impl From<VarExtractor> for Extractor {
    fn from(e: VarExtractor) -> Self {
        Extractor::Vars(e)
    }
}
