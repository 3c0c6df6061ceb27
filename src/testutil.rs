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
use std::path::PathBuf;

use crate::state::{Duration, State};

/// A pitched state lasting a whole number of quarter notes.
pub fn note(pitch: &str, quarters: i64) -> State {
    State::note(pitch, Duration::quarters(quarters).expect("positive duration"))
}

/// A pitched state lasting numer/denom quarter notes.
pub fn note_frac(pitch: &str, numer: i64, denom: i64) -> State {
    State::note(pitch, Duration::new(numer, denom).expect("positive duration"))
}

/// A rest lasting a whole number of quarter notes.
pub fn rest(quarters: i64) -> State {
    State::rest(Duration::quarters(quarters).expect("positive duration"))
}

/// A rest lasting numer/denom quarter notes.
pub fn rest_frac(numer: i64, denom: i64) -> State {
    State::rest(Duration::new(numer, denom).expect("positive duration"))
}

/// The opening of "Twinkle Twinkle Little Star", one example long.
pub fn twinkle() -> Vec<State> {
    vec![
        note("C5", 1),
        note("C5", 1),
        note("G5", 1),
        note("G5", 1),
        note("A5", 1),
        note("A5", 1),
        note("G5", 2),
        note("F5", 1),
        note("F5", 1),
        note("E5", 1),
        note("E5", 1),
        note("D5", 1),
        note("D5", 1),
        note("C5", 2),
    ]
}

/// The path to a test asset.
pub fn asset(path: &str) -> PathBuf {
    PathBuf::from("assets").join(path)
}
