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
use serde::Deserialize;

use super::generator::Defaults;
use crate::bars::{BarBudget, BarError};
use crate::model::{InitialCounting, ModelConfig};
use crate::state::Duration;

/// A YAML representation of a style: a corpus and how to learn from it.
#[derive(Deserialize, Clone, Debug)]
pub struct Style {
    /// The name requests refer to the style by.
    name: String,
    /// The corpus file, relative to the config file.
    corpus: String,
    /// Overrides the default model order.
    order: Option<usize>,
    /// Whether rests are learned (default: true).
    rests: Option<bool>,
    /// How the initial distribution is counted (default: all_positions).
    initial_counting: Option<InitialCounting>,
    /// Snaps corpus durations to multiples of this many quarter notes.
    quantize: Option<Duration>,
    /// Overrides the default melody length.
    length: Option<usize>,
    /// Overrides the default number of bars.
    num_bars: Option<u32>,
    /// Overrides the default meter.
    quarter_notes_per_bar: Option<Duration>,
}

impl Style {
    /// Creates a new style that uses the defaults for everything but its corpus.
    pub fn new(name: &str, corpus: &str) -> Style {
        Style {
            name: name.to_string(),
            corpus: corpus.to_string(),
            order: None,
            rests: None,
            initial_counting: None,
            quantize: None,
            length: None,
            num_bars: None,
            quarter_notes_per_bar: None,
        }
    }

    /// Sets the model order.
    pub fn with_order(mut self, order: usize) -> Style {
        self.order = Some(order);
        self
    }

    /// Gets the name of the style.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the corpus file of the style.
    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    /// Gets the quantization grid, if any.
    pub fn quantize(&self) -> Option<Duration> {
        self.quantize
    }

    /// Returns the model configuration for this style.
    pub fn model_config(&self, defaults: &Defaults) -> ModelConfig {
        ModelConfig {
            order: self.order.unwrap_or_else(|| defaults.order()),
            rests: self.rests.unwrap_or(true),
            initial_counting: self.initial_counting.unwrap_or_default(),
        }
    }

    /// Returns the melody length for this style.
    pub fn length(&self, defaults: &Defaults) -> usize {
        self.length.unwrap_or_else(|| defaults.length())
    }

    /// Returns the bar budget for this style.
    pub fn bar_budget(&self, defaults: &Defaults) -> Result<BarBudget, BarError> {
        BarBudget::new(
            self.num_bars.unwrap_or_else(|| defaults.num_bars()),
            self.quarter_notes_per_bar
                .map(|duration| duration.as_quarters())
                .unwrap_or_else(|| defaults.quarter_notes_per_bar()),
        )
    }
}
