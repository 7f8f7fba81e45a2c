//! Integration tests: full selection-then-recognition pipeline

use ndarray::Array2;
use seqsel::dataset::{Dataset, ItemData};
use seqsel::recognition::{recognize, WordModels};
use seqsel::selection::{ModelSelector, SelectionCriterion, SelectorConfig};

fn jitter(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    ((*state >> 33) % 1000) as f64 / 1000.0 * 0.5 - 0.25
}

fn make_sequence(regimes: &[f64], frames: usize, phase: u64) -> Array2<f64> {
    let mut state = phase.wrapping_add(1);
    let mut flat = Vec::with_capacity(regimes.len() * frames * 2);
    for &mean in regimes {
        for _ in 0..frames {
            flat.push(mean + jitter(&mut state));
            flat.push(mean + jitter(&mut state));
        }
    }
    Array2::from_shape_vec((regimes.len() * frames, 2), flat).unwrap()
}

fn make_item(regimes: &[f64], n_sequences: usize, phase: u64) -> ItemData {
    let seqs = (0..n_sequences)
        .map(|i| make_sequence(regimes, 5, phase + i as u64))
        .collect();
    ItemData::from_sequences(seqs).unwrap()
}

/// The end-to-end scenario: two words with two sequences each, BIC selection
/// over states 2..=3, then recognition of sequences built from each word's
/// statistics.
#[test]
fn test_yes_no_pipeline() {
    let mut dataset = Dataset::new();
    dataset.insert("YES", make_item(&[0.0, 1.0], 2, 7));
    dataset.insert("NO", make_item(&[5.0, 7.0], 2, 19));

    let config = SelectorConfig::default().with_state_range(2, 3);
    let selector = ModelSelector::new(SelectionCriterion::Bic, config).unwrap();

    let results = selector.select_all(&dataset).unwrap();
    assert!(
        results.values().all(|m| m.is_some()),
        "both words should produce a model"
    );

    let models = WordModels::from_selection(results);
    assert_eq!(models.len(), 2);

    // Held-out sequences drawn from each word's regime statistics
    let yes_probe = make_sequence(&[0.0, 1.0], 5, 101);
    let no_probe = make_sequence(&[5.0, 7.0], 5, 202);
    let test = vec![
        (yes_probe.clone(), vec![yes_probe.nrows()]),
        (no_probe.clone(), vec![no_probe.nrows()]),
    ];

    let output = recognize(&models, &test);
    assert_eq!(
        output.guesses,
        vec![Some("YES".to_string()), Some("NO".to_string())]
    );
    assert_eq!(output.accuracy(&["YES", "NO"]), 1.0);

    // Every score list carries both words, in the model set's order
    for scores in &output.scores {
        let words: Vec<&str> = scores.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(words, vec!["NO", "YES"]);
    }
}

#[test]
fn test_absent_words_are_skipped_when_building_the_model_set() {
    let mut dataset = Dataset::new();
    dataset.insert("ONLY", make_item(&[0.0, 1.0], 2, 3));

    // DIC cannot score a single-word dataset, so selection yields absence
    let config = SelectorConfig::default().with_state_range(2, 3);
    let selector = ModelSelector::new(SelectionCriterion::Dic, config).unwrap();
    let results = selector.select_all(&dataset).unwrap();
    assert!(results["ONLY"].is_none());

    let models = WordModels::from_selection(results);
    assert!(models.is_empty());

    // Recognition degrades to "no guess" rather than failing
    let probe = make_sequence(&[0.0, 1.0], 5, 9);
    let output = recognize(&models, &[(probe.clone(), vec![probe.nrows()])]);
    assert_eq!(output.guesses, vec![None]);
}

#[test]
fn test_recognition_works_across_strategies() {
    let mut dataset = Dataset::new();
    dataset.insert("LOW", make_item(&[0.0, 1.0], 4, 31));
    dataset.insert("HIGH", make_item(&[6.0, 8.0], 4, 47));

    let config = SelectorConfig::default().with_state_range(2, 3).with_n_folds(3);
    let probe = make_sequence(&[6.0, 8.0], 5, 999);
    let test = vec![(probe.clone(), vec![probe.nrows()])];

    for criterion in [
        SelectionCriterion::Constant,
        SelectionCriterion::Bic,
        SelectionCriterion::Dic,
        SelectionCriterion::CrossValidation,
    ] {
        let selector = ModelSelector::new(criterion, config.clone()).unwrap();
        let models = WordModels::from_selection(selector.select_all(&dataset).unwrap());
        let output = recognize(&models, &test);
        assert_eq!(
            output.guesses,
            vec![Some("HIGH".to_string())],
            "criterion {criterion:?} should still recognize the HIGH probe"
        );
    }
}
