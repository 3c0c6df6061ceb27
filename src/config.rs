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
use std::path::{Path, PathBuf};

mod error;
mod generator;
mod style;

pub use self::error::ConfigError;
pub use self::generator::{Defaults, Generator, DEFAULT_LENGTH};
pub use self::style::Style;

/// The environment variable consulted when no config path is given.
pub const CONFIG_ENV_VAR: &str = "MELODYGEN_CONFIG";

/// Resolves the config path to use.
///
/// Priority:
/// 1. The explicitly given path.
/// 2. The MELODYGEN_CONFIG environment variable.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(ConfigError::MissingPath(CONFIG_ENV_VAR)),
    }
}

/// Loads the generator configuration from a YAML or JSON file.
pub fn load(path: &Path) -> Result<Generator, ConfigError> {
    Generator::deserialize(path)
}
