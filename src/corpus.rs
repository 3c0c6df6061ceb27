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
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alphabet::Alphabet;
use crate::state::{checked_scale, Duration, State};

/// Errors raised while loading a corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("unable to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse corpus {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported corpus format for {0}, expected .yaml, .yml or .json")]
    UnsupportedFormat(PathBuf),
}

/// Training examples that have already been converted into states, as produced by
/// an ingestion tool from MIDI or score files.
///
/// In YAML:
///
/// ```yaml
/// states:     # optional, derived from the examples when absent
///   - [C5, 1]
/// examples:
///   - [[C5, 1], [D5, 0.5], [Rest, 1]]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Corpus {
    /// An explicit alphabet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    states: Option<Vec<State>>,
    /// The training examples. Each one is an independent phrase or piece.
    #[serde(default)]
    examples: Vec<Vec<State>>,
}

impl Corpus {
    /// Creates a corpus whose alphabet is derived from its examples.
    pub fn new(examples: Vec<Vec<State>>) -> Corpus {
        Corpus {
            states: None,
            examples,
        }
    }

    /// Creates a corpus with an explicit alphabet.
    pub fn with_states(states: Vec<State>, examples: Vec<Vec<State>>) -> Corpus {
        Corpus {
            states: Some(states),
            examples,
        }
    }

    /// Loads a corpus from a YAML or JSON file. Empty examples are dropped.
    pub fn load(path: &Path) -> Result<Corpus, CorpusError> {
        let contents = fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |message: String| CorpusError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut corpus: Corpus = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(CorpusError::UnsupportedFormat(path.to_path_buf())),
        };

        let before = corpus.examples.len();
        corpus.examples.retain(|example| !example.is_empty());
        if corpus.examples.len() < before {
            warn!(
                path = %path.display(),
                dropped = before - corpus.examples.len(),
                "Dropped empty examples from corpus."
            );
        }

        info!(
            path = %path.display(),
            examples = corpus.examples.len(),
            notes = corpus.note_count(),
            "Loaded corpus."
        );

        Ok(corpus)
    }

    /// The training examples.
    pub fn examples(&self) -> &[Vec<State>] {
        &self.examples
    }

    /// The number of examples.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// The total number of states across all examples.
    pub fn note_count(&self) -> usize {
        self.examples.iter().map(Vec::len).sum()
    }

    /// The alphabet for a model trained on this corpus: the explicit states if
    /// given, otherwise every state that appears in the examples.
    pub fn alphabet(&self) -> Alphabet {
        match &self.states {
            Some(states) => Alphabet::new(states.iter().cloned()),
            None => Alphabet::from_examples(&self.examples),
        }
    }

    /// Snaps every duration to the nearest multiple of `grid`. Nothing is shortened
    /// below a single grid step.
    pub fn quantize(&mut self, grid: Duration) {
        let snap = |state: &mut State| state.duration = quantize_duration(state.duration, grid);
        if let Some(states) = self.states.as_mut() {
            states.iter_mut().for_each(snap);
        }
        self.examples.iter_mut().flatten().for_each(snap);
    }
}

/// Rounds a duration to the nearest multiple of `grid`, with halves rounding to the
/// even multiple. Durations too finely divided to divide exactly by the grid are
/// left as they are.
pub fn quantize_duration(duration: Duration, grid: Duration) -> Duration {
    let (numer, denom) = (duration.as_quarters(), grid.as_quarters());
    let steps = Ratio::new(
        i128::from(*numer.numer()) * i128::from(*denom.denom()),
        i128::from(*numer.denom()) * i128::from(*denom.numer()),
    );

    let floor = steps.floor().to_integer();
    let rounded = match steps.fract().cmp(&Ratio::new(1, 2)) {
        Ordering::Less => floor,
        Ordering::Greater => floor + 1,
        Ordering::Equal if floor % 2 == 0 => floor,
        Ordering::Equal => floor + 1,
    };

    i64::try_from(rounded.max(1))
        .ok()
        .and_then(|steps| checked_scale(grid.as_quarters(), steps))
        .and_then(Duration::positive)
        .unwrap_or(duration)
}
