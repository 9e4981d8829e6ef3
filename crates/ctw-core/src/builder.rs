//! Models whose contexts are selected from a recorded history.

use crate::config::ModelConfig;
use crate::extract::{Var, VarExtractor};
use crate::factored::FactoredModel;
use crate::historian::Historian;
use crate::modeling::BitModel;
use crate::select::select_tree;
use crate::tree::ContextTree;
use ctw_common::Result;
use tracing::info;

/// Selects variable trees on `historian` and wraps them in a model.
///
/// When `factored`, each generated offset of the step gets its own tree and
/// factor; otherwise one tree is selected for all generated positions. The
/// returned model is untrained.
pub fn build_selected_model(
    historian: &Historian,
    config: &ModelConfig,
    factored: bool,
) -> Result<FactoredModel> {
    config.validate()?;
    model_from_trees(select_trees(historian, config, factored), config)
}

/// Wraps each variable tree in a [`VarExtractor`] and a context tree.
pub fn model_from_trees(trees: Vec<Option<Var>>, config: &ModelConfig) -> Result<FactoredModel> {
    info!(
        factors = trees.len(),
        selected = trees.iter().filter(|t| t.is_some()).count(),
        "building selected model"
    );
    FactoredModel::new(
        trees
            .into_iter()
            .map(|root| {
                ContextTree::new(config.estimator, VarExtractor::new(root, config.max_depth))
            })
            .collect(),
    )
}

/// One selected tree per factor (a single one when unfactored).
pub fn select_trees(historian: &Historian, config: &ModelConfig, factored: bool) -> Vec<Option<Var>> {
    let options = config.selection_options();
    if factored {
        historian
            .factored_positions()
            .iter()
            .map(|positions| select_tree(historian.history(), positions, &options))
            .collect()
    } else {
        vec![select_tree(
            historian.history(),
            &historian.generated_positions(),
            &options,
        )]
    }
}

/// Feeds every step of `historian` to `model`: generated bits, then added bits.
pub fn replay_steps<M: BitModel + ?Sized>(
    model: &mut M,
    historian: &Historian,
) -> Result<()> {
    for (generated, added) in historian.steps() {
        model.observe_generated_all(generated)?;
        model.observe_added(added);
    }
    Ok(())
}
