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
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bars::{BarBudget, BarError};
use crate::model::ModelError;
use crate::registry::{Registry, RegistryError};
use crate::state::{Duration, State};

/// Errors returned to callers of [Composer::compose].
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Budget(#[from] BarError),
}

/// A request for a new melody in a given style.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MelodyRequest {
    /// The style to generate in.
    pub style: String,
    /// The melody to continue from. May be empty.
    #[serde(default)]
    pub previous: Vec<State>,
    /// Overrides the style's melody length, previous sequence included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Overrides the style's number of bars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bars: Option<u32>,
    /// Overrides the style's meter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter_notes_per_bar: Option<Duration>,
    /// Seeds the random source, for reproducible output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl MelodyRequest {
    /// A request for a fresh melody with the style's defaults.
    pub fn new(style: &str) -> MelodyRequest {
        MelodyRequest {
            style: style.to_string(),
            ..Default::default()
        }
    }
}

/// A generated melody.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MelodyResponse {
    /// The whole melody: the previous sequence followed by the new notes.
    pub melody: Vec<State>,
    /// Only the new notes, fitted to the bar budget.
    pub new_notes: Vec<State>,
    /// True if the previous sequence couldn't be continued and was discarded.
    pub recovered: bool,
}

/// Answers melody requests against a registry of trained styles.
pub struct Composer {
    registry: Arc<Registry>,
}

impl Composer {
    /// Creates a new composer.
    pub fn new(registry: Arc<Registry>) -> Composer {
        Composer { registry }
    }

    /// Gets the registry the composer draws from.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Generates a melody for the request.
    ///
    /// A previous sequence containing states the style has never seen can't be
    /// continued. It is discarded and a fresh melody of the requested length is
    /// generated from the style's initial distribution instead, with `recovered` set
    /// in the response. Only the new notes are fitted to the bar budget.
    pub fn compose(&self, request: &MelodyRequest) -> Result<MelodyResponse, ComposeError> {
        let style = self.registry.get(&request.style)?;
        let length = request.length.unwrap_or(style.length());
        let budget = BarBudget::new(
            request.num_bars.unwrap_or(style.budget().num_bars()),
            request
                .quarter_notes_per_bar
                .map(|duration| duration.as_quarters())
                .unwrap_or(style.budget().quarter_notes_per_bar()),
        )?;
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let model = style.model();
        let (melody, recovered) = match model.generate(length, &request.previous, &mut rng) {
            Ok(melody) => (melody, false),
            Err(ModelError::Sampling(e)) => {
                warn!(
                    style = style.name(),
                    err = %e,
                    "Unable to continue previous sequence, generating a fresh melody."
                );
                (model.generate(length, &[], &mut rng)?, true)
            }
            Err(e) => return Err(e.into()),
        };
        let (melody, new_notes) = melody.enforce_bars(&budget)?.into_parts();

        debug!(
            style = style.name(),
            length,
            previous = request.previous.len(),
            new_notes = new_notes.len(),
            recovered,
            "Composed melody."
        );

        Ok(MelodyResponse {
            melody,
            new_notes,
            recovered,
        })
    }
}
