//! Factored model: one context tree per bit offset of a repeating step.
//!
//! Multi-bit symbols (bytes, fixed-width fields) have different statistics at
//! each bit offset. The factored model keeps N trees and a rotating offset;
//! the tree at the offset learns the next generated bit while every other
//! tree only sees it as context.

use crate::modeling::BitModel;
use crate::tree::ContextTree;
use ctw_common::{Bit, Error, Result};
use ctw_math::Estimator;
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct FactoredModel {
    factors: Vec<ContextTree>,
    offset: usize,
}

impl FactoredModel {
    /// Wraps the given trees, in offset order.
    pub fn new(factors: Vec<ContextTree>) -> Result<Self> {
        if factors.is_empty() {
            return Err(Error::Config(
                "a factored model needs at least one factor".to_string(),
            ));
        }
        Ok(Self { factors, offset: 0 })
    }

    /// N plain-suffix trees with the same estimator and depth limit.
    pub fn with_max_depth(
        estimator: Estimator,
        max_depth: Option<usize>,
        num_factors: usize,
    ) -> Result<Self> {
        Self::new(
            (0..num_factors)
                .map(|_| ContextTree::with_max_depth(estimator, max_depth))
                .collect(),
        )
    }

    /// Index of the factor that receives the next generated bit.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn factors(&self) -> &[ContextTree] {
        &self.factors
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    fn active(&self) -> &ContextTree {
        &self.factors[self.offset]
    }
}

impl BitModel for FactoredModel {
    fn observe_generated(&mut self, bit: Bit) -> Result<()> {
        // The active factor goes first: if it rejects the bit nothing else
        // has changed yet.
        self.factors[self.offset].observe_generated(bit)?;
        for (i, factor) in self.factors.iter_mut().enumerate() {
            if i != self.offset {
                factor.observe_added(&[bit]);
            }
        }
        trace!(%bit, offset = self.offset, "routed generated bit");
        self.offset = (self.offset + 1) % self.factors.len();
        Ok(())
    }

    fn observe_added(&mut self, bits: &[Bit]) {
        for factor in &mut self.factors {
            factor.observe_added(bits);
        }
    }

    fn predict_next(&self) -> f64 {
        self.active().predict_next()
    }

    fn undo_last_generated(&mut self) -> Result<()> {
        let n = self.factors.len();
        let offset = (self.offset + n - 1) % n;
        self.factors[offset].undo_last_generated()?;
        for (i, factor) in self.factors.iter_mut().enumerate() {
            if i != offset {
                factor.undo_added(1)?;
            }
        }
        self.offset = offset;
        Ok(())
    }

    fn undo_added(&mut self, n: usize) -> Result<()> {
        // A generated bit is journaled only by the factor that learned it.
        for factor in &self.factors {
            factor.check_undo_added(n)?;
        }
        for factor in &mut self.factors {
            factor.undo_added(n)?;
        }
        Ok(())
    }

    fn switch_history(&mut self) {
        self.offset = 0;
        for factor in &mut self.factors {
            factor.switch_history();
        }
    }

    fn history_log_probability(&self) -> f64 {
        self.factors
            .iter()
            .map(ContextTree::history_log_probability)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctw_common::parse_bits;

    fn bits(s: &str) -> Vec<Bit> {
        parse_bits(s).unwrap()
    }

    #[test]
    fn offset_cycles() {
        let mut model = FactoredModel::with_max_depth(Estimator::Kt, None, 3).unwrap();
        assert_eq!(model.offset(), 0);
        model.observe_generated_all(&bits("100")).unwrap();
        assert_eq!(model.offset(), 0);
        model.observe_added(&bits("10"));
        assert_eq!(model.offset(), 0);
        model.observe_generated(Bit::One).unwrap();
        assert_eq!(model.offset(), 1);
        model.observe_generated(Bit::Zero).unwrap();
        assert_eq!(model.offset(), 2);
        model.observe_generated(Bit::Zero).unwrap();
        assert_eq!(model.offset(), 0);
    }

    #[test]
    fn undo_generated_rewinds() {
        let mut model =
            FactoredModel::with_max_depth(Estimator::Deterministic, Some(2), 3).unwrap();
        model.observe_generated_all(&bits("100100")).unwrap();
        assert!((model.predict_next() - 1.0).abs() < 1e-12);

        model.observe_generated(Bit::One).unwrap();
        assert_eq!(model.predict_next(), 0.0);
        model.undo_last_generated().unwrap();
        assert!((model.predict_next() - 1.0).abs() < 1e-12);

        model.undo_generated(6).unwrap();
        assert_eq!(model.offset(), 0);
        assert!((model.predict_next() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn factors_stay_in_step() {
        let mut model = FactoredModel::with_max_depth(Estimator::Kt, Some(4), 3).unwrap();
        model.observe_generated_all(&bits("11010")).unwrap();
        let counts: Vec<u64> = model.factors().iter().map(|f| f.generated_count()).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        assert!(model.factors().iter().all(|f| f.history().len() == 5));
    }

    #[test]
    fn log_probability_is_the_sum_of_factors() {
        let mut model = FactoredModel::with_max_depth(Estimator::Kt, None, 2).unwrap();
        model.observe_generated_all(&bits("0110")).unwrap();
        let sum: f64 = model
            .factors()
            .iter()
            .map(|f| f.history_log_probability())
            .sum();
        assert_eq!(model.history_log_probability(), sum);
    }

    #[test]
    fn rejected_bit_changes_nothing() {
        let mut model =
            FactoredModel::with_max_depth(Estimator::Deterministic, Some(0), 2).unwrap();
        model.observe_generated_all(&bits("00")).unwrap();
        let before = model.clone();
        assert!(matches!(
            model.observe_generated(Bit::One),
            Err(Error::ImpossibleHistory { .. })
        ));
        assert_eq!(model, before);
    }

    #[test]
    fn undo_added_refuses_any_generated_bit() {
        let mut model = FactoredModel::with_max_depth(Estimator::Kt, None, 2).unwrap();
        model.observe_generated_all(&bits("10")).unwrap();
        let before = model.clone();
        // The newest bit was learned by the second factor only.
        assert!(matches!(model.undo_added(1), Err(Error::UndoMismatch(_))));
        assert_eq!(model, before);

        model.observe_added(&bits("11"));
        model.undo_added(2).unwrap();
        assert_eq!(model, before);
    }

    #[test]
    fn switch_resets_offset() {
        let mut model = FactoredModel::with_max_depth(Estimator::Kt, None, 3).unwrap();
        model.observe_generated_all(&bits("10")).unwrap();
        model.switch_history();
        assert_eq!(model.offset(), 0);
        assert!(model.factors().iter().all(|f| f.history().is_empty()));
    }

    #[test]
    fn needs_a_factor() {
        assert!(matches!(FactoredModel::new(Vec::new()), Err(Error::Config(_))));
    }
}
