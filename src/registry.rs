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
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, info_span};

use crate::bars::{BarBudget, BarError};
use crate::config::{Generator, Style};
use crate::corpus::{Corpus, CorpusError};
use crate::model::{MarkovModel, ModelError};

/// Errors raised while building or querying the style registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unable to find style {0}")]
    UnknownStyle(String),

    #[error("style {0} is registered more than once")]
    DuplicateStyle(String),

    #[error("style {style}: {source}")]
    Corpus {
        style: String,
        #[source]
        source: CorpusError,
    },

    #[error("style {style}: {source}")]
    Model {
        style: String,
        #[source]
        source: ModelError,
    },

    #[error("style {style}: {source}")]
    Budget {
        style: String,
        #[source]
        source: BarError,
    },
}

/// A trained model for one style, along with its generation defaults.
#[derive(Debug)]
pub struct StyleModel {
    /// The name of the style.
    name: String,
    /// The trained model.
    model: MarkovModel,
    /// The default melody length.
    length: usize,
    /// The default bar budget for generated material.
    budget: BarBudget,
}

impl StyleModel {
    /// Creates a new style from a trained model.
    pub fn new(name: &str, model: MarkovModel, length: usize, budget: BarBudget) -> StyleModel {
        StyleModel {
            name: name.to_string(),
            model,
            length,
            budget,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &MarkovModel {
        &self.model
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn budget(&self) -> &BarBudget {
        &self.budget
    }
}

impl fmt::Display for StyleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (order: {}, states: {}, contexts: {}, examples: {}, bars: {})",
            self.name,
            self.model.order(),
            self.model.alphabet().len(),
            self.model.context_count(),
            self.model.examples_seen(),
            self.budget.num_bars(),
        )
    }
}

/// The trained styles, keyed by name. Built once up front and then only read.
#[derive(Debug, Default)]
pub struct Registry {
    styles: HashMap<String, Arc<StyleModel>>,
}

impl Registry {
    /// Creates a registry from already trained styles.
    pub fn new(styles: Vec<StyleModel>) -> Result<Registry, RegistryError> {
        let mut registry = Registry::default();
        for style in styles {
            if registry.styles.contains_key(style.name()) {
                return Err(RegistryError::DuplicateStyle(style.name().to_string()));
            }
            registry
                .styles
                .insert(style.name().to_string(), Arc::new(style));
        }

        Ok(registry)
    }

    /// Loads and trains every style in the configuration. Styles are independent, so
    /// they are trained in parallel.
    pub fn from_config(generator: &Generator) -> Result<Registry, RegistryError> {
        let styles = generator
            .styles()
            .par_iter()
            .map(|style| build_style(generator, style))
            .collect::<Result<Vec<StyleModel>, RegistryError>>()?;

        let registry = Registry::new(styles)?;
        info!(styles = registry.len(), "Style registry initialized.");
        Ok(registry)
    }

    /// Gets a style from the registry.
    pub fn get(&self, name: &str) -> Result<Arc<StyleModel>, RegistryError> {
        match self.styles.get(name) {
            Some(style) => Ok(Arc::clone(style)),
            None => Err(RegistryError::UnknownStyle(name.to_string())),
        }
    }

    /// Returns an unsorted list of the styles in the registry.
    pub fn list(&self) -> Vec<Arc<StyleModel>> {
        self.styles.values().cloned().collect()
    }

    /// Returns a list of the styles sorted by name.
    pub fn sorted_list(&self) -> Vec<Arc<StyleModel>> {
        let mut sorted = self.list();
        sorted.sort_by(|a, b| a.name().cmp(b.name()));
        sorted
    }

    /// Returns the number of styles.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Styles ({}):", self.styles.len())?;
        for style in self.sorted_list() {
            writeln!(f, "  - {}", style)?;
        }

        Ok(())
    }
}

/// Loads a style's corpus and trains its model.
pub fn build_style(generator: &Generator, style: &Style) -> Result<StyleModel, RegistryError> {
    let span = info_span!("style", name = style.name());
    let _enter = span.enter();

    let defaults = generator.defaults();
    let mut corpus =
        Corpus::load(&generator.corpus_path(style)).map_err(|source| RegistryError::Corpus {
            style: style.name().to_string(),
            source,
        })?;
    if let Some(grid) = style.quantize() {
        corpus.quantize(grid);
    }

    let config = style.model_config(&defaults);
    let alphabet = if config.rests {
        corpus.alphabet()
    } else {
        corpus.alphabet().without_rests()
    };

    let model_error = |source: ModelError| RegistryError::Model {
        style: style.name().to_string(),
        source,
    };
    let mut model = MarkovModel::new(alphabet, config).map_err(model_error)?;
    model.train(corpus.examples()).map_err(model_error)?;

    let budget = style
        .bar_budget(&defaults)
        .map_err(|source| RegistryError::Budget {
            style: style.name().to_string(),
            source,
        })?;

    info!(
        order = model.order(),
        states = model.alphabet().len(),
        contexts = model.context_count(),
        examples = corpus.len(),
        "Trained style."
    );

    Ok(StyleModel::new(
        style.name(),
        model,
        style.length(&defaults),
        budget,
    ))
}
