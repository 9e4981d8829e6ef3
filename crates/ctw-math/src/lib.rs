//! Context-tree weighting math utilities.

pub mod math;

pub use math::entropy::*;
pub use math::estimator::Estimator;
pub use math::stable::*;
