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
use std::collections::HashMap;
use std::fmt;

use crate::state::State;

/// The fixed set of states a model knows about. Every state is assigned an index in
/// `0..len()` in first-seen order, and that mapping never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct Alphabet {
    /// The states, in index order.
    states: Vec<State>,
    /// The reverse mapping from state to index.
    indexes: HashMap<State, usize>,
}

impl Alphabet {
    /// Creates an alphabet from the given states. Duplicates keep their first index.
    pub fn new<I>(states: I) -> Alphabet
    where
        I: IntoIterator<Item = State>,
    {
        let mut alphabet = Alphabet::default();
        for state in states {
            if !alphabet.indexes.contains_key(&state) {
                alphabet.indexes.insert(state.clone(), alphabet.states.len());
                alphabet.states.push(state);
            }
        }
        alphabet
    }

    /// Collects every state that appears in the given examples.
    pub fn from_examples(examples: &[Vec<State>]) -> Alphabet {
        Alphabet::new(examples.iter().flatten().cloned())
    }

    /// The number of states in the alphabet.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if the alphabet has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Gets the index of a state, if it belongs to the alphabet.
    pub fn index_of(&self, state: &State) -> Option<usize> {
        self.indexes.get(state).copied()
    }

    /// Gets the state at the given index.
    pub fn get(&self, index: usize) -> Option<&State> {
        self.states.get(index)
    }

    pub fn contains(&self, state: &State) -> bool {
        self.indexes.contains_key(state)
    }

    /// The states in index order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Returns true if any state in the alphabet is a rest.
    pub fn has_rests(&self) -> bool {
        self.states.iter().any(State::is_rest)
    }

    /// The same alphabet with every rest removed. Indexes are reassigned.
    pub fn without_rests(&self) -> Alphabet {
        Alphabet::new(self.states.iter().filter(|state| !state.is_rest()).cloned())
    }

    /// Maps a sequence onto indexes. On failure, returns the position of the first
    /// state that isn't in the alphabet.
    pub(crate) fn indexes_of(&self, sequence: &[State]) -> Result<Vec<usize>, usize> {
        sequence
            .iter()
            .enumerate()
            .map(|(position, state)| self.index_of(state).ok_or(position))
            .collect()
    }
}

impl FromIterator<State> for Alphabet {
    fn from_iter<T: IntoIterator<Item = State>>(iter: T) -> Self {
        Alphabet::new(iter)
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Alphabet ({} states):", self.states.len())?;
        for (index, state) in self.states.iter().enumerate() {
            writeln!(f, "  {:4}: {}", index, state)?;
        }

        Ok(())
    }
}
