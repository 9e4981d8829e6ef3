//! Context-tree weighting core library.
//!
//! This library provides:
//! - The incremental CTW model over a bit stream ([`ContextTree`])
//! - Factored composition for multi-bit symbols ([`FactoredModel`])
//! - Greedy context selection and variable-tree extraction
//! - Step-structured histories, model builders and corpus training
//! - Configuration, logging and exit codes for the `ctw` binary
//!
//! The binary entry point is in `main.rs`.

pub mod builder;
pub mod config;
pub mod corpus;
pub mod exit_codes;
pub mod extract;
pub mod factored;
pub mod historian;
pub mod logging;
pub mod modeling;
pub mod select;
pub mod tree;

pub use builder::{build_selected_model, model_from_trees, replay_steps, select_trees};
pub use config::{load_config, ConfigError, ConfigOptions, ModelConfig, ResolvedConfig};
pub use corpus::{cost_bits, train, TrainingSummary};
pub use extract::{Extractor, SuffixExtractor, Var, VarExtractor};
pub use factored::FactoredModel;
pub use historian::Historian;
pub use modeling::{advance, continue_greedy, BitModel};
pub use select::{select_tree, MissingContext, SelectionOptions};
pub use tree::{ContextNode, ContextTree, NodeView};

pub use ctw_common::{Bit, Error, Result};
pub use ctw_math::Estimator;
