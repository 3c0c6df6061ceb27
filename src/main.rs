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
use clap::{crate_version, Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use melodygen::composer::{Composer, MelodyRequest};
use melodygen::config;
use melodygen::registry::{self, Registry};
use melodygen::state::{Duration, State};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A Markov chain melody generator."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Generates a melody in the given style.
    Generate {
        /// The name of the style to generate in.
        style: String,
        /// The path to the generator config. Defaults to $MELODYGEN_CONFIG.
        #[arg[short, long]]
        config: Option<String>,
        /// The melody length, including the previous sequence.
        #[arg[short, long]]
        length: Option<usize>,
        /// The number of bars the new notes should fill.
        #[arg[short, long]]
        bars: Option<u32>,
        /// The number of quarter notes per bar, e.g. 3 or 7/2.
        #[arg[short, long]]
        quarter_notes_per_bar: Option<Duration>,
        /// The melody to continue from, as JSON. For example, [["C5", 1], ["Rest", 0.5]]
        #[arg[short, long]]
        previous: Option<String>,
        /// Seeds the random source for reproducible output.
        #[arg[short, long]]
        seed: Option<u64>,
        /// The output format.
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Lists the styles in the generator config.
    Styles {
        /// The path to the generator config. Defaults to $MELODYGEN_CONFIG.
        config: Option<String>,
    },
    /// Verifies that every style in the generator config loads and trains.
    Verify {
        /// The path to the generator config. Defaults to $MELODYGEN_CONFIG.
        config: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            style,
            config: config_path,
            length,
            bars,
            quarter_notes_per_bar,
            previous,
            seed,
            format,
        } => {
            let path = config::resolve_config_path(config_path.as_deref())?;
            let generator = config::load(&path)?;
            let previous: Vec<State> = match previous {
                Some(previous) => serde_json::from_str(&previous)?,
                None => Vec::new(),
            };

            let composer = Composer::new(Arc::new(Registry::from_config(&generator)?));
            let response = composer.compose(&MelodyRequest {
                style,
                previous,
                length,
                num_bars: bars,
                quarter_notes_per_bar,
                seed,
            })?;

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                Format::Yaml => print!("{}", serde_yml::to_string(&response)?),
            }
        }
        Commands::Styles {
            config: config_path,
        } => {
            let path = config::resolve_config_path(config_path.as_deref())?;
            let generator = config::load(&path)?;
            let registry = Registry::from_config(&generator)?;

            if registry.is_empty() {
                println!("No styles found.");
                return Ok(());
            }

            print!("{}", registry);
        }
        Commands::Verify {
            config: config_path,
        } => {
            let path = config::resolve_config_path(config_path.as_deref())?;
            let generator = config::load(&path)?;

            let mut failures = 0;
            for style in generator.styles() {
                match registry::build_style(&generator, style) {
                    Ok(style) => println!("- {}: ok", style.name()),
                    Err(e) => {
                        failures += 1;
                        println!("- {}: {}", style.name(), e);
                    }
                }
            }

            if failures > 0 {
                return Err(format!(
                    "{} of {} styles in {} failed to build",
                    failures,
                    generator.styles().len(),
                    path.display()
                )
                .into());
            }
            println!("{} is valid.", path.display());
        }
    }

    Ok(())
}
