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
use std::collections::{BTreeMap, HashMap};

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alphabet::Alphabet;
use crate::bars::{BarBudget, BarError};
use crate::state::State;

#[cfg(test)]
mod tests;

/// The default number of trailing states used as context.
pub const DEFAULT_ORDER: usize = 5;

/// How training populates the initial distribution, which is also the fallback
/// distribution for unseen contexts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialCounting {
    /// Every state of every example counts, so the initial distribution is the
    /// positional frequency of each state across the whole corpus.
    #[default]
    AllPositions,
    /// Only the first state of each example counts.
    ExampleStarts,
}

/// Construction parameters for a [MarkovModel].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// The number of trailing states used as context. Must be at least 1.
    pub order: usize,
    /// Whether rests are part of the alphabet. When disabled, rests in training
    /// examples act as phrase boundaries and are never learned.
    pub rests: bool,
    /// How the initial distribution is counted.
    pub initial_counting: InitialCounting,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            order: DEFAULT_ORDER,
            rests: true,
            initial_counting: InitialCounting::default(),
        }
    }
}

impl ModelConfig {
    /// A default configuration with the given order.
    pub fn with_order(order: usize) -> ModelConfig {
        ModelConfig {
            order,
            ..Default::default()
        }
    }
}

/// Errors raised while sampling from a trained model.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("state {state} at position {position} is not in the alphabet")]
    UnknownState { state: State, position: usize },
}

/// Errors raised by a [MarkovModel].
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid model configuration: {0}")]
    InvalidConfiguration(String),

    #[error("training example {example} contains state {state}, which is not in the alphabet")]
    UnknownState { state: State, example: usize },

    #[error("sampling failed: {0}")]
    Sampling(#[from] SamplingError),

    #[error("no training observations are available to sample from")]
    DegenerateDistribution,
}

/// A normalized discrete distribution over alphabet indexes. Only outcomes with a
/// nonzero weight are stored; sampling is a binary search over cumulative weights.
#[derive(Debug, Clone)]
struct Categorical {
    /// Alphabet indexes with a nonzero weight.
    outcomes: Vec<usize>,
    /// Probabilities, parallel to outcomes.
    probabilities: Vec<f64>,
    sampler: WeightedIndex<f64>,
}

impl Categorical {
    /// Builds a distribution from (index, count) pairs. Returns None when there are
    /// no observations at all.
    fn from_counts<I>(counts: I) -> Option<Categorical>
    where
        I: IntoIterator<Item = (usize, u64)>,
    {
        let (outcomes, weights): (Vec<usize>, Vec<f64>) = counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(index, count)| (index, count as f64))
            .unzip();

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }

        let sampler = WeightedIndex::new(&weights).ok()?;
        let probabilities = weights.iter().map(|weight| weight / total).collect();
        Some(Categorical {
            outcomes,
            probabilities,
            sampler,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.outcomes[self.sampler.sample(rng)]
    }

    /// Expands the distribution into one probability per alphabet index.
    fn dense(&self, len: usize) -> Vec<f64> {
        let mut dense = vec![0.0; len];
        for (&index, &probability) in self.outcomes.iter().zip(self.probabilities.iter()) {
            dense[index] = probability;
        }
        dense
    }
}

/// The observed continuations of a single context.
#[derive(Debug, Clone, Default)]
struct Row {
    /// Raw counts of each next state, by alphabet index.
    counts: BTreeMap<usize, u64>,
    /// The normalized row. None if the row has no observations.
    distribution: Option<Categorical>,
}

/// The result of a generation: a previous sequence followed by a generated tail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Melody {
    /// The previous sequence followed by the generated states.
    full: Vec<State>,
    /// The number of leading states that came from the previous sequence.
    previous_len: usize,
}

impl Melody {
    /// The whole melody.
    pub fn full(&self) -> &[State] {
        &self.full
    }

    /// The caller-supplied part of the melody.
    pub fn previous(&self) -> &[State] {
        &self.full[..self.previous_len]
    }

    /// Only the generated states.
    pub fn generated(&self) -> &[State] {
        &self.full[self.previous_len..]
    }

    /// Splits the melody into the whole sequence and the generated tail.
    pub fn into_parts(self) -> (Vec<State>, Vec<State>) {
        let generated = self.generated().to_vec();
        (self.full, generated)
    }

    /// Fits the generated tail to the bar budget. The previous sequence is untouched.
    pub fn enforce_bars(self, budget: &BarBudget) -> Result<Melody, BarError> {
        let generated = budget.enforce(self.generated())?;

        let mut full = self.full;
        full.truncate(self.previous_len);
        full.extend(generated);

        Ok(Melody {
            full,
            previous_len: self.previous_len,
        })
    }
}

/// An order-k Markov chain over a fixed alphabet of (symbol, duration) states.
///
/// The model is trained from independent examples; contexts never span two examples.
/// Training is additive: raw counts accumulate across calls to [MarkovModel::train]
/// and every call re-derives the probabilities from all counts seen so far. Once
/// trained, the model is read-only and can be shared between threads.
#[derive(Debug, Clone)]
pub struct MarkovModel {
    /// The states this model can emit.
    alphabet: Alphabet,
    /// The construction parameters.
    config: ModelConfig,
    /// Raw initial counts, one per alphabet index.
    initial_counts: Vec<u64>,
    /// The normalized initial distribution. None until something has been counted.
    initial: Option<Categorical>,
    /// Transition rows keyed by context, a sequence of exactly `order` indexes.
    transitions: HashMap<Vec<usize>, Row>,
    /// The number of examples trained on so far.
    examples_seen: usize,
}

impl MarkovModel {
    /// Creates an untrained model.
    pub fn new(alphabet: Alphabet, config: ModelConfig) -> Result<MarkovModel, ModelError> {
        if alphabet.is_empty() {
            return Err(ModelError::InvalidConfiguration(
                "the alphabet must contain at least one state".to_string(),
            ));
        }
        if config.order < 1 {
            return Err(ModelError::InvalidConfiguration(
                "the order must be at least 1".to_string(),
            ));
        }
        if !config.rests && alphabet.has_rests() {
            return Err(ModelError::InvalidConfiguration(
                "the alphabet contains rests, but rests are disabled".to_string(),
            ));
        }

        Ok(MarkovModel {
            initial_counts: vec![0; alphabet.len()],
            alphabet,
            config,
            initial: None,
            transitions: HashMap::new(),
            examples_seen: 0,
        })
    }

    /// The alphabet of the model.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The order of the model.
    pub fn order(&self) -> usize {
        self.config.order
    }

    /// The construction parameters of the model.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The number of distinct contexts observed during training.
    pub fn context_count(&self) -> usize {
        self.transitions.len()
    }

    /// The number of examples trained on.
    pub fn examples_seen(&self) -> usize {
        self.examples_seen
    }

    /// Returns true if the model has an initial distribution to sample from.
    pub fn is_trained(&self) -> bool {
        self.initial.is_some()
    }

    /// The initial distribution, one probability per alphabet index. All zeros if
    /// nothing has been observed.
    pub fn initial_probabilities(&self) -> Vec<f64> {
        match &self.initial {
            Some(initial) => initial.dense(self.alphabet.len()),
            None => vec![0.0; self.alphabet.len()],
        }
    }

    /// The transition row for a context, one probability per alphabet index. Returns
    /// None if the context was never observed.
    pub fn transition_row(&self, context: &[State]) -> Option<Vec<f64>> {
        let context = self.alphabet.indexes_of(context).ok()?;
        let row = self.transitions.get(&context)?;
        Some(match &row.distribution {
            Some(distribution) => distribution.dense(self.alphabet.len()),
            None => vec![0.0; self.alphabet.len()],
        })
    }

    /// Trains the model on a collection of independent examples.
    ///
    /// The whole corpus is checked against the alphabet before anything is counted,
    /// so a failed call leaves the model unchanged.
    pub fn train(&mut self, examples: &[Vec<State>]) -> Result<(), ModelError> {
        let mut phrases: Vec<Vec<usize>> = Vec::with_capacity(examples.len());
        for (example_index, example) in examples.iter().enumerate() {
            for phrase in self.split_phrases(example) {
                let indexes = self
                    .alphabet
                    .indexes_of(phrase)
                    .map_err(|position| ModelError::UnknownState {
                        state: phrase[position].clone(),
                        example: example_index,
                    })?;
                phrases.push(indexes);
            }
        }

        let order = self.config.order;
        let mut transition_count = 0usize;
        for phrase in phrases.iter() {
            match self.config.initial_counting {
                InitialCounting::AllPositions => {
                    for &index in phrase.iter() {
                        self.initial_counts[index] += 1;
                    }
                }
                InitialCounting::ExampleStarts => {
                    if let Some(&first) = phrase.first() {
                        self.initial_counts[first] += 1;
                    }
                }
            }

            // Each window is `order` context states followed by the next state. The scan
            // is per phrase, so no context crosses from one example into another.
            for window in phrase.windows(order + 1) {
                let (context, next) = window.split_at(order);
                *self
                    .transitions
                    .entry(context.to_vec())
                    .or_default()
                    .counts
                    .entry(next[0])
                    .or_insert(0) += 1;
                transition_count += 1;
            }
        }

        self.examples_seen += examples.len();
        self.normalize();

        debug!(
            examples = examples.len(),
            phrases = phrases.len(),
            transitions = transition_count,
            contexts = self.transitions.len(),
            "Trained model."
        );

        Ok(())
    }

    /// Splits an example into the phrases the model learns from. With rests enabled
    /// the example is a single phrase, otherwise rests separate phrases.
    fn split_phrases<'a>(&self, example: &'a [State]) -> Vec<&'a [State]> {
        if self.config.rests {
            vec![example]
        } else {
            example
                .split(State::is_rest)
                .filter(|phrase| !phrase.is_empty())
                .collect()
        }
    }

    /// Re-derives every probability from the accumulated counts.
    fn normalize(&mut self) {
        self.initial = Categorical::from_counts(self.initial_counts.iter().copied().enumerate());
        for row in self.transitions.values_mut() {
            row.distribution =
                Categorical::from_counts(row.counts.iter().map(|(&index, &count)| (index, count)));
        }
    }

    /// Generates a melody of `length` states, continuing from `previous`.
    ///
    /// With an empty previous sequence, the first state is drawn from the initial
    /// distribution. Otherwise, the previous sequence is used verbatim as the start of
    /// the melody. If it already holds `length` states or more, nothing is generated.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        length: usize,
        previous: &[State],
        rng: &mut R,
    ) -> Result<Melody, ModelError> {
        if length == 0 {
            return Err(ModelError::InvalidConfiguration(
                "the generation length must be at least 1".to_string(),
            ));
        }

        let mut indexes = self
            .alphabet
            .indexes_of(previous)
            .map_err(|position| SamplingError::UnknownState {
                state: previous[position].clone(),
                position,
            })?;
        indexes.reserve(length.saturating_sub(indexes.len()));

        if indexes.is_empty() {
            indexes.push(self.starting_index(rng)?);
        }
        while indexes.len() < length {
            let start = indexes.len().saturating_sub(self.config.order);
            let next = self.next_index(&indexes[start..], rng)?;
            indexes.push(next);
        }

        let full: Vec<State> = indexes
            .into_iter()
            .map(|index| self.alphabet.states()[index].clone())
            .collect();
        let melody = Melody {
            previous_len: previous.len(),
            full,
        };

        debug!(
            length,
            previous = previous.len(),
            generated = melody.generated().len(),
            "Generated melody."
        );

        Ok(melody)
    }

    /// Draws the state that follows the given context. Contexts shorter than the
    /// order, unseen contexts and contexts without continuations fall back to the
    /// initial distribution.
    pub fn next_state<R: Rng + ?Sized>(
        &self,
        context: &[State],
        rng: &mut R,
    ) -> Result<State, ModelError> {
        let context = self
            .alphabet
            .indexes_of(context)
            .map_err(|position| SamplingError::UnknownState {
                state: context[position].clone(),
                position,
            })?;
        let start = context.len().saturating_sub(self.config.order);
        let next = self.next_index(&context[start..], rng)?;
        Ok(self.alphabet.states()[next].clone())
    }

    /// Draws a starting state from the initial distribution.
    pub fn starting_state<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<State, ModelError> {
        let index = self.starting_index(rng)?;
        Ok(self.alphabet.states()[index].clone())
    }

    fn next_index<R: Rng + ?Sized>(
        &self,
        context: &[usize],
        rng: &mut R,
    ) -> Result<usize, ModelError> {
        if context.len() == self.config.order {
            if let Some(distribution) = self
                .transitions
                .get(context)
                .and_then(|row| row.distribution.as_ref())
            {
                return Ok(distribution.sample(rng));
            }
        }

        self.starting_index(rng)
    }

    fn starting_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, ModelError> {
        match &self.initial {
            Some(initial) => Ok(initial.sample(rng)),
            None => Err(ModelError::DegenerateDistribution),
        }
    }
}
