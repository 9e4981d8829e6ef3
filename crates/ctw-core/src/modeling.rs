//! The sequential bit-model interface shared by single and factored trees.

use ctw_common::{Bit, Result};
use tracing::trace;

/// An online probability model over a bit stream.
///
/// Generated bits are the ones the model must explain; added bits only
/// extend the context. Every observation can be undone in reverse order.
pub trait BitModel {
    /// Observes a bit the model is responsible for predicting.
    ///
    /// Fails with [`ctw_common::Error::ImpossibleHistory`] when the bit has
    /// zero probability; the model is then left as it was before the call.
    fn observe_generated(&mut self, bit: Bit) -> Result<()>;

    /// Extends the context without touching any statistics.
    fn observe_added(&mut self, bits: &[Bit]);

    /// P(next generated bit = 1 | history), in `[0, 1]`.
    fn predict_next(&self) -> f64;

    fn undo_last_generated(&mut self) -> Result<()>;

    fn undo_added(&mut self, n: usize) -> Result<()>;

    /// Starts a new, empty history while keeping what has been learned.
    fn switch_history(&mut self);

    /// Natural log of the probability of all generated bits.
    fn history_log_probability(&self) -> f64;

    /// Observes each bit as generated, stopping at the first failure.
    ///
    /// Bits before the failing one stay observed.
    fn observe_generated_all(&mut self, bits: &[Bit]) -> Result<()> {
        for &bit in bits {
            self.observe_generated(bit)?;
        }
        Ok(())
    }

    fn undo_generated(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.undo_last_generated()?;
        }
        Ok(())
    }
}

/// Greedy continuation: observes the more likely next bit as generated.
///
/// Ties go to 1. Returns the chosen bit and the probability the model gave it.
pub fn advance<M: BitModel + ?Sized>(model: &mut M) -> Result<(Bit, f64)> {
    let p_one = model.predict_next();
    let (bit, p) = if p_one >= 0.5 {
        (Bit::One, p_one)
    } else {
        (Bit::Zero, 1.0 - p_one)
    };
    model.observe_generated(bit)?;
    trace!(%bit, p, "advanced");
    Ok((bit, p))
}

/// Extends the model by `n` greedy bits.
pub fn continue_greedy<M: BitModel + ?Sized>(model: &mut M, n: usize) -> Result<Vec<(Bit, f64)>> {
    (0..n).map(|_| advance(model)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ContextTree;
    use ctw_common::{format_bits, parse_bits};
    use ctw_math::Estimator;

    #[test]
    fn worked_example() {
        let mut model = ContextTree::with_max_depth(Estimator::Kt, None);
        model
            .observe_generated_all(&parse_bits("01101").unwrap())
            .unwrap();
        let before = model.history_log_probability();

        model
            .observe_generated_all(&parse_bits("1011011011").unwrap())
            .unwrap();
        let ratio = (model.history_log_probability() - before).exp();
        assert!((ratio - 0.052825).abs() < 1e-6, "ratio = {ratio}");
    }

    #[test]
    fn greedy_continuation() {
        let mut model = ContextTree::with_max_depth(Estimator::Kt, None);
        model
            .observe_generated_all(&parse_bits("01101").unwrap())
            .unwrap();
        let before = model.history_log_probability();

        let steps = continue_greedy(&mut model, 10).unwrap();
        let bits: Vec<Bit> = steps.iter().map(|(bit, _)| *bit).collect();
        assert_eq!(format_bits(&bits), "1011011011");

        let product: f64 = steps.iter().map(|(_, p)| p).product();
        let ratio = (model.history_log_probability() - before).exp();
        assert!((product - ratio).abs() < 1e-12);
        assert!(steps.iter().all(|(_, p)| *p >= 0.5));
    }

    #[test]
    fn undo_generated_counts_bits() {
        let mut model = ContextTree::with_max_depth(Estimator::Kt, Some(4));
        model.observe_generated_all(&parse_bits("0110").unwrap()).unwrap();
        model.undo_generated(3).unwrap();
        assert_eq!(model.history().len(), 1);
        assert!(model.undo_generated(2).is_err());
    }
}
