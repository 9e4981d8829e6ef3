//! Core math modules.

pub mod entropy;
pub mod estimator;
pub mod stable;
