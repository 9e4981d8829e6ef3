//! Step-structured histories.
//!
//! A history made of repeated steps: `num_generated` bits the model must
//! predict, followed by `num_added` bits of side information.

use ctw_common::{Bit, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Historian {
    history: Vec<Bit>,
    num_generated: usize,
    num_added: usize,
}

impl Historian {
    pub fn new(history: Vec<Bit>, num_generated: usize, num_added: usize) -> Result<Self> {
        let step = num_generated + num_added;
        if num_generated == 0 || history.len() % step != 0 {
            return Err(Error::HistoryShape {
                len: history.len(),
                step,
            });
        }
        Ok(Self {
            history,
            num_generated,
            num_added,
        })
    }

    pub fn history(&self) -> &[Bit] {
        &self.history
    }

    pub fn num_generated(&self) -> usize {
        self.num_generated
    }

    pub fn num_added(&self) -> usize {
        self.num_added
    }

    pub fn step_len(&self) -> usize {
        self.num_generated + self.num_added
    }

    pub fn num_steps(&self) -> usize {
        self.history.len() / self.step_len()
    }

    fn step_starts(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_steps()).map(move |i| i * self.step_len())
    }

    /// Positions of every generated bit, in order.
    pub fn generated_positions(&self) -> Vec<usize> {
        self.step_starts()
            .flat_map(|start| start..start + self.num_generated)
            .collect()
    }

    /// Generated positions grouped by their offset within the step.
    pub fn factored_positions(&self) -> Vec<Vec<usize>> {
        (0..self.num_generated)
            .map(|offset| self.step_starts().map(|start| start + offset).collect())
            .collect()
    }

    /// `(generated, added)` slices of each step.
    pub fn steps(&self) -> Vec<(&[Bit], &[Bit])> {
        self.step_starts()
            .map(|start| {
                let (generated, added) = self.history[start..start + self.step_len()]
                    .split_at(self.num_generated);
                (generated, added)
            })
            .collect()
    }
}
