// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::alphabet::Alphabet;
use crate::bars::BarBudget;
use crate::state::State;
use crate::testutil::{note, rest, twinkle};

use super::{InitialCounting, MarkovModel, ModelConfig, ModelError, SamplingError};

const EPSILON: f64 = 1e-9;

fn assert_close(expected: f64, actual: f64) {
    assert!(
        (expected - actual).abs() < EPSILON,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn trained(examples: &[Vec<State>], config: ModelConfig) -> MarkovModel {
    let mut model =
        MarkovModel::new(Alphabet::from_examples(examples), config).expect("valid model");
    model.train(examples).expect("training should succeed");
    model
}

/// The alphabet and corpus of the C/D alternation scenario.
fn alternating() -> MarkovModel {
    let alphabet = Alphabet::new(vec![note("C", 1), note("D", 1), rest(1)]);
    let mut model = MarkovModel::new(alphabet, ModelConfig::with_order(1)).expect("valid model");
    model
        .train(&[vec![note("C", 1), note("D", 1), note("C", 1), note("D", 1)]])
        .expect("training should succeed");
    model
}

#[test]
fn test_invalid_configuration() {
    assert!(matches!(
        MarkovModel::new(Alphabet::default(), ModelConfig::default()),
        Err(ModelError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        MarkovModel::new(Alphabet::new(twinkle()), ModelConfig::with_order(0)),
        Err(ModelError::InvalidConfiguration(_))
    ));

    let config = ModelConfig {
        rests: false,
        ..ModelConfig::with_order(1)
    };
    assert!(matches!(
        MarkovModel::new(Alphabet::new(vec![note("C5", 1), rest(1)]), config),
        Err(ModelError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_untrained_model_is_degenerate() {
    let model =
        MarkovModel::new(Alphabet::new(twinkle()), ModelConfig::with_order(2)).expect("valid model");
    let mut rng = StdRng::seed_from_u64(1);

    assert!(!model.is_trained());
    assert_close(0.0, model.initial_probabilities().iter().sum());
    assert!(matches!(
        model.generate(4, &[], &mut rng),
        Err(ModelError::DegenerateDistribution)
    ));

    // A known previous sequence still needs the fallback for its unseen context.
    assert!(matches!(
        model.generate(4, &[note("C5", 1)], &mut rng),
        Err(ModelError::DegenerateDistribution)
    ));
}

#[test]
fn test_empty_training_data_stays_degenerate() {
    let mut model =
        MarkovModel::new(Alphabet::new(twinkle()), ModelConfig::with_order(1)).expect("valid model");
    model.train(&[vec![]]).expect("training should succeed");

    assert!(!model.is_trained());
    assert_eq!(1, model.examples_seen());
    assert_eq!(0, model.context_count());
}

#[test]
fn test_probabilities_are_normalized() {
    for order in 1..=4 {
        let model = trained(&[twinkle()], ModelConfig::with_order(order));

        assert_close(1.0, model.initial_probabilities().iter().sum());
        assert!(model.context_count() > 0);

        for window in twinkle().windows(order) {
            let row = model
                .transition_row(window)
                .unwrap_or_else(|| vec![0.0; model.alphabet().len()]);
            let sum: f64 = row.iter().sum();
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
            assert!(
                (sum - 1.0).abs() < EPSILON || sum.abs() < EPSILON,
                "row sum {} for order {}",
                sum,
                order
            );
        }
    }
}

#[test]
fn test_alternating_scenario() {
    let model = alternating();

    let row = model.transition_row(&[note("C", 1)]).expect("observed context");
    assert_eq!(vec![0.0, 1.0, 0.0], row);
    let row = model.transition_row(&[note("D", 1)]).expect("observed context");
    assert_eq!(vec![1.0, 0.0, 0.0], row);
    assert!(model.transition_row(&[rest(1)]).is_none());

    for seed in 0..100 {
        let mut rng = StdRng::seed_from_u64(seed);
        let melody = model.generate(4, &[], &mut rng).expect("generation should succeed");

        assert_eq!(4, melody.full().len());
        assert!(melody.full().iter().all(|state| !state.is_rest()));
        for pair in melody.full().windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}

#[test]
fn test_first_state_has_initial_probability() {
    let config = ModelConfig {
        initial_counting: InitialCounting::ExampleStarts,
        ..ModelConfig::with_order(2)
    };
    let examples = vec![
        vec![note("E5", 1), note("D5", 1), note("C5", 1)],
        vec![note("G5", 1), note("E5", 1), note("C5", 1)],
    ];
    let model = trained(&examples, config);
    let initial = model.initial_probabilities();

    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let melody = model.generate(6, &[], &mut rng).expect("generation should succeed");
        let first = model
            .alphabet()
            .index_of(&melody.full()[0])
            .expect("generated state is in the alphabet");
        assert!(initial[first] > 0.0);
    }
}

#[test]
fn test_initial_counting() {
    let examples = vec![
        vec![note("E5", 1), note("D5", 1), note("C5", 1)],
        vec![note("E5", 1), note("C5", 1)],
    ];

    let positional = trained(&examples, ModelConfig::with_order(1));
    assert_eq!(
        vec![0.4, 0.2, 0.4],
        positional.initial_probabilities(),
        "every position counts"
    );

    let starts = trained(
        &examples,
        ModelConfig {
            initial_counting: InitialCounting::ExampleStarts,
            ..ModelConfig::with_order(1)
        },
    );
    assert_eq!(vec![1.0, 0.0, 0.0], starts.initial_probabilities());
}

#[test]
fn test_higher_order_counts() {
    let example = vec![
        note("A4", 1),
        note("B4", 1),
        note("C5", 1),
        note("A4", 1),
        note("B4", 1),
        note("D5", 1),
    ];
    let model = trained(&[example], ModelConfig::with_order(2));

    // (A4, B4) continues to C5 once and D5 once.
    let row = model
        .transition_row(&[note("A4", 1), note("B4", 1)])
        .expect("observed context");
    assert_eq!(vec![0.0, 0.0, 0.5, 0.5], row);
    // Four windows of three states, three distinct contexts.
    assert_eq!(3, model.context_count());
    // (B4, D5) ends the example and has no continuation.
    assert!(model
        .transition_row(&[note("B4", 1), note("D5", 1)])
        .is_none());
}

#[test]
fn test_contexts_never_cross_examples() {
    let examples = vec![
        vec![note("A4", 1), note("B4", 1)],
        vec![note("C5", 1), note("D5", 1)],
    ];
    let model = trained(&examples, ModelConfig::with_order(1));

    assert!(model.transition_row(&[note("B4", 1)]).is_none());
    assert_eq!(
        vec![0.0, 1.0, 0.0, 0.0],
        model.transition_row(&[note("A4", 1)]).expect("observed context")
    );
    assert_eq!(
        vec![0.0, 0.0, 0.0, 1.0],
        model.transition_row(&[note("C5", 1)]).expect("observed context")
    );
    assert_eq!(2, model.context_count());
}

#[test]
fn test_training_is_additive() {
    let first = vec![twinkle()];
    let second = vec![vec![note("C5", 1), note("G5", 1), note("C5", 2)]];
    let all: Vec<Vec<State>> = first.iter().chain(second.iter()).cloned().collect();

    let mut incremental =
        MarkovModel::new(Alphabet::from_examples(&all), ModelConfig::with_order(1))
            .expect("valid model");
    incremental.train(&first).expect("training should succeed");
    incremental.train(&second).expect("training should succeed");

    let mut batch = MarkovModel::new(Alphabet::from_examples(&all), ModelConfig::with_order(1))
        .expect("valid model");
    batch.train(&all).expect("training should succeed");

    assert_eq!(batch.initial_probabilities(), incremental.initial_probabilities());
    for state in batch.alphabet().states() {
        assert_eq!(
            batch.transition_row(std::slice::from_ref(state)),
            incremental.transition_row(std::slice::from_ref(state))
        );
    }
    assert_eq!(2, incremental.examples_seen());
}

#[test]
fn test_failed_training_leaves_model_unchanged() {
    let mut model = MarkovModel::new(
        Alphabet::new(vec![note("C5", 1), note("D5", 1)]),
        ModelConfig::with_order(1),
    )
    .expect("valid model");

    let result = model.train(&[
        vec![note("C5", 1), note("D5", 1)],
        vec![note("C5", 1), note("E5", 1)],
    ]);

    match result {
        Err(ModelError::UnknownState { state, example }) => {
            assert_eq!(note("E5", 1), state);
            assert_eq!(1, example);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(!model.is_trained());
    assert_eq!(0, model.context_count());
    assert_eq!(0, model.examples_seen());
}

#[test]
fn test_rests_split_phrases_when_disabled() {
    let config = ModelConfig {
        rests: false,
        ..ModelConfig::with_order(1)
    };
    let alphabet = Alphabet::new(vec![note("C5", 1), note("D5", 1), note("E5", 1)]);
    let mut model = MarkovModel::new(alphabet, config).expect("valid model");
    model
        .train(&[vec![
            note("C5", 1),
            rest(1),
            note("D5", 1),
            note("E5", 1),
            rest(2),
        ]])
        .expect("training should succeed");

    assert!(model.transition_row(&[note("C5", 1)]).is_none());
    assert_eq!(
        vec![0.0, 0.0, 1.0],
        model.transition_row(&[note("D5", 1)]).expect("observed context")
    );
    assert_close(1.0, model.initial_probabilities().iter().sum());
}

#[test]
fn test_previous_sequence_is_kept() {
    let model = trained(&[twinkle()], ModelConfig::with_order(2));
    let previous = vec![note("C5", 1), note("C5", 1), note("G5", 1)];

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let melody = model
            .generate(10, &previous, &mut rng)
            .expect("generation should succeed");

        assert_eq!(10, melody.full().len());
        assert_eq!(7, melody.generated().len());
        assert_eq!(previous.as_slice(), melody.previous());
        assert_eq!(&melody.full()[3..], melody.generated());
        assert!(melody
            .generated()
            .iter()
            .all(|state| model.alphabet().contains(state)));
    }
}

#[test]
fn test_long_previous_sequence_generates_nothing() {
    let model = trained(&[twinkle()], ModelConfig::with_order(1));
    let mut rng = StdRng::seed_from_u64(7);

    let melody = model
        .generate(3, &twinkle()[..5], &mut rng)
        .expect("generation should succeed");
    assert_eq!(&twinkle()[..5], melody.full());
    assert!(melody.generated().is_empty());
}

#[test]
fn test_generation_is_reproducible() {
    let model = trained(&[twinkle()], ModelConfig::with_order(1));

    let first = model
        .generate(20, &[], &mut StdRng::seed_from_u64(42))
        .expect("generation should succeed");
    let second = model
        .generate(20, &[], &mut StdRng::seed_from_u64(42))
        .expect("generation should succeed");
    assert_eq!(first, second);
}

#[test]
fn test_unknown_previous_state() {
    let model = trained(&[twinkle()], ModelConfig::with_order(1));
    let mut rng = StdRng::seed_from_u64(3);

    let result = model.generate(8, &[note("C5", 1), note("B9", 3)], &mut rng);
    match result {
        Err(ModelError::Sampling(SamplingError::UnknownState { state, position })) => {
            assert_eq!(note("B9", 3), state);
            assert_eq!(1, position);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_zero_length() {
    let model = trained(&[twinkle()], ModelConfig::with_order(1));
    let mut rng = StdRng::seed_from_u64(3);

    assert!(matches!(
        model.generate(0, &[], &mut rng),
        Err(ModelError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_unseen_context_falls_back() {
    let model = trained(&[twinkle()], ModelConfig::with_order(3));
    let initial = model.initial_probabilities();

    // G5 G5 G5 never occurs in the training data.
    let unseen = vec![note("G5", 1), note("G5", 1), note("G5", 1)];
    assert!(model.transition_row(&unseen).is_none());
    // (D5, D5, C5:2) ends the example, so it has no continuation either.
    let terminal = vec![note("D5", 1), note("D5", 1), note("C5", 2)];
    assert!(model.transition_row(&terminal).is_none());
    // Shorter than the order.
    let short = vec![note("F5", 1)];

    for context in [unseen, terminal, short] {
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let next = model
                .next_state(&context, &mut rng)
                .expect("fallback should succeed");
            let index = model.alphabet().index_of(&next).expect("known state");
            assert!(initial[index] > 0.0);
        }
    }
}

#[test]
fn test_observed_context_follows_row() {
    let model = trained(&[twinkle()], ModelConfig::with_order(2));
    let context = vec![note("A5", 1), note("A5", 1)];

    for seed in 0..30 {
        let mut rng = StdRng::seed_from_u64(seed);
        assert_eq!(
            note("G5", 2),
            model
                .next_state(&context, &mut rng)
                .expect("sampling should succeed")
        );
    }

    // Only the last `order` states of a longer context matter.
    let longer = vec![note("E5", 1), note("D5", 1), note("A5", 1), note("A5", 1)];
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(
        note("G5", 2),
        model.next_state(&longer, &mut rng).expect("sampling should succeed")
    );
}

#[test]
fn test_enforce_bars_only_touches_generated() {
    let model = trained(&[twinkle()], ModelConfig::with_order(1));
    let previous = vec![note("C5", 2), note("G5", 2)];
    let budget = BarBudget::new(1, num_rational::Ratio::from_integer(4)).expect("valid budget");

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let melody = model
            .generate(12, &previous, &mut rng)
            .expect("generation should succeed")
            .enforce_bars(&budget)
            .expect("durations fit");

        assert_eq!(previous.as_slice(), melody.previous());
        assert_eq!(
            Some(budget.target()),
            crate::state::total_duration(melody.generated())
        );
    }
}

#[test]
fn test_melody_parts() {
    let model = trained(&[twinkle()], ModelConfig::with_order(1));
    let previous = vec![note("C5", 1), note("C5", 1)];
    let melody = model
        .generate(6, &previous, &mut StdRng::seed_from_u64(3))
        .expect("generation should succeed");

    let (full, generated) = melody.clone().into_parts();
    assert_eq!(melody.full(), full.as_slice());
    assert_eq!(melody.generated(), generated.as_slice());
    assert_eq!(previous.as_slice(), &full[..2]);
    assert_eq!(4, generated.len());
}

#[test]
fn test_model_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MarkovModel>();
}
