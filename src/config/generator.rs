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
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, File};
use num_rational::Ratio;
use serde::Deserialize;

use super::error::ConfigError;
use super::style::Style;
use crate::bars::{DEFAULT_NUM_BARS, DEFAULT_QUARTER_NOTES_PER_BAR};
use crate::model::DEFAULT_ORDER;
use crate::state::{Duration, Quarters};

/// The default number of states in a generated melody, previous sequence included.
pub const DEFAULT_LENGTH: usize = 15;

/// Generation parameters shared by all styles unless a style overrides them.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Defaults {
    /// The model order (default: 5).
    order: Option<usize>,
    /// The melody length in states (default: 15).
    length: Option<usize>,
    /// The number of bars the generated tail is fitted to (default: 10).
    num_bars: Option<u32>,
    /// The meter, in quarter notes per bar (default: 4).
    quarter_notes_per_bar: Option<Duration>,
}

impl Defaults {
    /// Returns the model order.
    pub fn order(&self) -> usize {
        self.order.unwrap_or(DEFAULT_ORDER)
    }

    /// Returns the melody length.
    pub fn length(&self) -> usize {
        self.length.unwrap_or(DEFAULT_LENGTH)
    }

    /// Returns the number of bars.
    pub fn num_bars(&self) -> u32 {
        self.num_bars.unwrap_or(DEFAULT_NUM_BARS)
    }

    /// Returns the number of quarter notes per bar.
    pub fn quarter_notes_per_bar(&self) -> Quarters {
        self.quarter_notes_per_bar
            .map(|duration| duration.as_quarters())
            .unwrap_or_else(|| Ratio::from_integer(DEFAULT_QUARTER_NOTES_PER_BAR))
    }
}

/// A YAML representation of the generator configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Generator {
    /// Defaults for every style.
    defaults: Option<Defaults>,
    /// The styles to train.
    #[serde(default)]
    styles: Vec<Style>,
    /// The directory corpus paths are relative to.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Generator {
    /// Creates a new generator configuration.
    pub fn new(defaults: Defaults, styles: Vec<Style>, base_path: &Path) -> Generator {
        Generator {
            defaults: Some(defaults),
            styles,
            base_path: base_path.to_path_buf(),
        }
    }

    /// Parse a generator configuration from a file. Corpus paths are resolved
    /// relative to the directory of the file.
    pub fn deserialize(path: &Path) -> Result<Generator, ConfigError> {
        let mut generator = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Generator>()?;
        generator.base_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
        generator.validate()?;
        Ok(generator)
    }

    /// Gets the defaults.
    pub fn defaults(&self) -> Defaults {
        self.defaults.clone().unwrap_or_default()
    }

    /// Gets the styles.
    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    /// Gets the location of a style's corpus.
    pub fn corpus_path(&self, style: &Style) -> PathBuf {
        self.base_path.join(style.corpus())
    }

    /// Checks for values that can't produce a usable generator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.styles.is_empty() {
            return Err(ConfigError::Invalid("no styles configured".to_string()));
        }

        let defaults = self.defaults();
        let mut names: HashSet<&str> = HashSet::new();
        for style in self.styles.iter() {
            if !names.insert(style.name()) {
                return Err(ConfigError::Invalid(format!(
                    "style {} is defined more than once",
                    style.name()
                )));
            }
            if style.model_config(&defaults).order < 1 {
                return Err(ConfigError::Invalid(format!(
                    "style {}: order must be at least 1",
                    style.name()
                )));
            }
            if style.length(&defaults) < 1 {
                return Err(ConfigError::Invalid(format!(
                    "style {}: length must be at least 1",
                    style.name()
                )));
            }
            if let Err(e) = style.bar_budget(&defaults) {
                return Err(ConfigError::Invalid(format!("style {}: {}", style.name(), e)));
            }
        }

        Ok(())
    }
}
