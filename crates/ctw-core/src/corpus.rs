//! Training on a corpus of independent examples.

use crate::modeling::BitModel;
use ctw_common::{Bit, Result};
use serde::Serialize;
use std::f64::consts::LN_2;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub examples: usize,
    pub bits: usize,
    /// Summed code length of the examples, in bits.
    pub cost_bits: f64,
}

impl TrainingSummary {
    pub fn avg_cost_bits(&self) -> f64 {
        if self.examples == 0 {
            0.0
        } else {
            self.cost_bits / self.examples as f64
        }
    }
}

/// Code length in bits of a natural-log probability.
pub fn cost_bits(log_p: f64) -> f64 {
    (0.0 - log_p) / LN_2
}

/// Feeds each example as generated bits, switching history after each one.
///
/// An example with zero probability is rolled back entirely before its
/// error is returned; earlier examples stay learned.
pub fn train<M, I, S>(model: &mut M, examples: I) -> Result<TrainingSummary>
where
    M: BitModel + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<[Bit]>,
{
    let mut summary = TrainingSummary::default();
    for example in examples {
        let bits = example.as_ref();
        let before = model.history_log_probability();
        for (i, &bit) in bits.iter().enumerate() {
            if let Err(err) = model.observe_generated(bit) {
                model.undo_generated(i)?;
                return Err(err);
            }
        }
        let cost = cost_bits(model.history_log_probability() - before);
        debug!(example = summary.examples, bits = bits.len(), cost, "trained example");

        model.switch_history();
        summary.examples += 1;
        summary.bits += bits.len();
        summary.cost_bits += cost;
    }
    info!(
        examples = summary.examples,
        bits = summary.bits,
        cost_bits = summary.cost_bits,
        "training complete"
    );
    Ok(summary)
}
