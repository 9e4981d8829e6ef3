//! Integration tests for factored models, context selection and the
//! historian-driven model builder.

use ctw_core::{
    build_selected_model, cost_bits, replay_steps, select_tree, select_trees, train, BitModel,
    ContextTree, Error, Estimator, Extractor, FactoredModel, Historian, ModelConfig,
    SelectionOptions, Var, VarExtractor,
};
use ctw_common::{parse_bits, Bit};
use proptest::prelude::*;

fn bits(s: &str) -> Vec<Bit> {
    parse_bits(s).unwrap()
}

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn all_sequences(n: usize) -> impl Iterator<Item = Vec<Bit>> {
    (0u32..1 << n).map(move |code| {
        (0..n)
            .map(|i| Bit::from_bool(code >> (n - 1 - i) & 1 == 1))
            .collect()
    })
}

// ============================================================================
// Factored model
// ============================================================================

#[test]
fn factored_model_distributes_unit_mass() {
    for num_factors in 1..=3 {
        let model = FactoredModel::with_max_depth(Estimator::Kt, Some(2), num_factors).unwrap();
        let total: f64 = all_sequences(6)
            .map(|seq| {
                let mut model = model.clone();
                model.observe_generated_all(&seq).unwrap();
                model.history_log_probability().exp()
            })
            .sum();
        assert!(approx_eq(total, 1.0, 1e-9), "{num_factors} factors: {total}");
    }
}

#[test]
fn single_factor_matches_a_plain_tree() {
    let seq = bits("0110100110010110");
    let mut factored = FactoredModel::with_max_depth(Estimator::Kt, Some(3), 1).unwrap();
    let mut tree = ContextTree::with_max_depth(Estimator::Kt, Some(3));
    for &bit in &seq {
        assert_eq!(factored.predict_next(), tree.predict_next());
        factored.observe_generated(bit).unwrap();
        tree.observe_generated(bit).unwrap();
    }
    assert_eq!(factored.history_log_probability(), tree.history_log_probability());
}

#[test]
fn factors_learn_their_own_offset() {
    // Every even bit is 1 and every odd bit is 0.
    let mut model = FactoredModel::with_max_depth(Estimator::Deterministic, Some(0), 2).unwrap();
    model.observe_generated_all(&bits("101010")).unwrap();
    assert!(approx_eq(model.predict_next(), 1.0, 1e-12));
    model.observe_generated(Bit::One).unwrap();
    assert_eq!(model.predict_next(), 0.0);
    assert!(matches!(
        model.observe_generated(Bit::One),
        Err(Error::ImpossibleHistory { position: 7 })
    ));
    assert_eq!(model.offset(), 1);
}

#[test]
fn training_shares_statistics_across_examples() {
    let mut model = FactoredModel::with_max_depth(Estimator::Kt, Some(3), 2).unwrap();
    let example = bits("1001100110011001");
    let first = train(&mut model, [&example]).unwrap();
    let second = train(&mut model, [&example]).unwrap();
    assert!(second.cost_bits < first.cost_bits);
    assert_eq!(model.offset(), 0);
    assert!(approx_eq(
        first.cost_bits + second.cost_bits,
        cost_bits(model.history_log_probability()),
        1e-9
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Generated and added bits undo back to the exact earlier state.
    #[test]
    fn factored_undo_is_an_exact_inverse(
        prefix in prop::collection::vec(any::<bool>(), 0..12),
        generated in prop::collection::vec(any::<bool>(), 0..12),
        added in prop::collection::vec(any::<bool>(), 0..4),
        num_factors in 1usize..4,
    ) {
        let to_bits = |v: &[bool]| v.iter().copied().map(Bit::from_bool).collect::<Vec<_>>();
        let mut model = FactoredModel::with_max_depth(Estimator::Kt, None, num_factors).unwrap();
        model.observe_generated_all(&to_bits(&prefix)).unwrap();
        let checkpoint = model.clone();

        model.observe_generated_all(&to_bits(&generated)).unwrap();
        model.observe_added(&to_bits(&added));
        model.undo_added(added.len()).unwrap();
        model.undo_generated(generated.len()).unwrap();
        prop_assert_eq!(model, checkpoint);
    }
}

// ============================================================================
// Context selection
// ============================================================================

/// History in which each bit repeats the bit three positions back.
fn period_three(len: usize) -> Vec<Bit> {
    bits("011").into_iter().cycle().take(len).collect()
}

#[test]
fn selection_finds_a_useful_variable() {
    let history = period_three(60);
    let positions: Vec<usize> = (0..history.len()).collect();
    let tree = select_tree(&history, &positions, &SelectionOptions::default()).unwrap();
    assert!(tree.index() < 0);
    assert!(tree.index() >= -(history.len() as isize));
}

#[test]
fn selection_depth_limits_levels() {
    let history = period_three(60);
    let positions: Vec<usize> = (0..history.len()).collect();
    for depth in 0..=3 {
        let options = SelectionOptions {
            max_depth: Some(depth),
            ..Default::default()
        };
        let tree = select_tree(&history, &positions, &options).unwrap();
        // Levels count from 0, so depth d allows d + 1 of them.
        assert!(tree.depth() <= depth + 1, "{depth}: {tree}");
    }
}

#[test]
fn alternation_at_depth_zero_selects_the_previous_bit() {
    let history = bits("01").repeat(20);
    let positions: Vec<usize> = (1..history.len()).collect();
    let options = SelectionOptions {
        max_depth: Some(0),
        ..Default::default()
    };
    let tree = select_tree(&history, &positions, &options).unwrap();
    assert_eq!(tree, Var::leaf(-1).unwrap());
}

#[test]
fn selected_tree_serializes_as_json() {
    let history = period_three(30);
    let positions: Vec<usize> = (3..history.len()).collect();
    let tree = select_tree(&history, &positions, &SelectionOptions::default()).unwrap();

    let json = serde_json::to_string(&tree).unwrap();
    let parsed: Var = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, tree);
}

#[test]
fn var_extractor_model_sees_selected_context() {
    // Predict each bit from the bit two positions back.
    let mut tree = ContextTree::new(
        Estimator::Deterministic,
        VarExtractor::new(Some(Var::leaf(-2).unwrap()), Some(1)),
    );
    tree.observe_generated_all(&bits("0110011001")).unwrap();
    assert!(matches!(tree.extractor(), Extractor::Vars(_)));
    // The bit two back is 0, and a 0 two back has always been followed by 1.
    assert!(approx_eq(tree.predict_next(), 1.0, 1e-12));
}

// ============================================================================
// Historian and builder
// ============================================================================

fn step_history() -> Historian {
    // Steps of two generated bits followed by one added bit.
    let steps = [
        "010", "001", "110", "101", "010", "000", "111", "101", "011", "111", "100", "001",
    ];
    Historian::new(bits(&steps.concat()), 2, 1).unwrap()
}

#[test]
fn historian_rejects_partial_steps() {
    assert!(matches!(
        Historian::new(bits("0101"), 2, 1),
        Err(Error::HistoryShape { len: 4, step: 3 })
    ));
    assert!(Historian::new(bits("01"), 0, 2).is_err());
}

#[test]
fn factored_selection_replays_history() {
    let historian = step_history();
    let config = ModelConfig::default();

    let trees = select_trees(&historian, &config, true);
    assert_eq!(trees.len(), 2);

    let mut model = build_selected_model(&historian, &config, true).unwrap();
    replay_steps(&mut model, &historian).unwrap();
    assert_eq!(model.offset(), 0);

    let learned: Vec<u64> = model.factors().iter().map(|f| f.generated_count()).collect();
    assert_eq!(learned, vec![12, 12]);
    assert!(model.factors().iter().all(|f| f.history().len() == 36));

    let cost = cost_bits(model.history_log_probability());
    assert!(cost > 0.0 && cost.is_finite());
}

#[test]
fn selected_model_beats_a_memoryless_one() {
    let historian = Historian::new(period_three(90), 1, 0).unwrap();
    let config = ModelConfig::default();

    let mut selected = build_selected_model(&historian, &config, false).unwrap();
    replay_steps(&mut selected, &historian).unwrap();

    let mut memoryless = FactoredModel::with_max_depth(Estimator::Kt, Some(0), 1).unwrap();
    replay_steps(&mut memoryless, &historian).unwrap();

    assert!(
        selected.history_log_probability() > memoryless.history_log_probability(),
        "selected {} vs memoryless {}",
        selected.history_log_probability(),
        memoryless.history_log_probability()
    );
}
