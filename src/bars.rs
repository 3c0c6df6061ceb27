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
use num_rational::Ratio;

use crate::state::{checked_add, checked_scale, checked_sub, Duration, Quarters, State};

/// The default number of bars a generated tail is fitted to.
pub const DEFAULT_NUM_BARS: u32 = 10;

/// The default meter: four quarter notes per bar.
pub const DEFAULT_QUARTER_NOTES_PER_BAR: i64 = 4;

/// Errors for badly specified bar budgets.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BarError {
    #[error("invalid bar budget: {0}")]
    InvalidBudget(String),

    #[error("durations are too finely divided to add up exactly: {0}")]
    Overflow(String),
}

/// A target length for generated material, expressed in bars of a fixed meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarBudget {
    num_bars: u32,
    quarter_notes_per_bar: Quarters,
    target: Quarters,
}

impl Default for BarBudget {
    fn default() -> Self {
        BarBudget {
            num_bars: DEFAULT_NUM_BARS,
            quarter_notes_per_bar: Ratio::from_integer(DEFAULT_QUARTER_NOTES_PER_BAR),
            target: Ratio::from_integer(
                i64::from(DEFAULT_NUM_BARS) * DEFAULT_QUARTER_NOTES_PER_BAR,
            ),
        }
    }
}

impl BarBudget {
    /// Creates a new budget. Both values must be strictly positive, and the total
    /// must be representable.
    pub fn new(num_bars: u32, quarter_notes_per_bar: Quarters) -> Result<BarBudget, BarError> {
        if num_bars == 0 {
            return Err(BarError::InvalidBudget(
                "the number of bars must be at least 1".to_string(),
            ));
        }
        if *quarter_notes_per_bar.numer() <= 0 {
            return Err(BarError::InvalidBudget(format!(
                "quarter notes per bar must be positive, got {}",
                quarter_notes_per_bar
            )));
        }

        let target = checked_scale(quarter_notes_per_bar, i64::from(num_bars)).ok_or_else(|| {
            BarError::InvalidBudget(format!(
                "{} bars of {} quarter notes is too long",
                num_bars, quarter_notes_per_bar
            ))
        })?;

        Ok(BarBudget {
            num_bars,
            quarter_notes_per_bar,
            target,
        })
    }

    /// A budget in a meter given as a [Duration], which is always positive.
    pub fn with_meter(
        num_bars: u32,
        quarter_notes_per_bar: Duration,
    ) -> Result<BarBudget, BarError> {
        BarBudget::new(num_bars, quarter_notes_per_bar.as_quarters())
    }

    pub fn num_bars(&self) -> u32 {
        self.num_bars
    }

    pub fn quarter_notes_per_bar(&self) -> Quarters {
        self.quarter_notes_per_bar
    }

    /// The total duration, in quarter notes, that enforced sequences add up to.
    pub fn target(&self) -> Quarters {
        self.target
    }

    /// Fits a sequence to the budget.
    ///
    /// States are kept whole while they fit. The first state that would overrun the
    /// target is shortened to the remaining duration, keeping its label, and nothing
    /// after it is kept. A sequence that falls short is padded with a single rest.
    /// The result always adds up to exactly [BarBudget::target]. Fails only if the
    /// running total can't be represented exactly.
    pub fn enforce(&self, sequence: &[State]) -> Result<Vec<State>, BarError> {
        let target = self.target;
        let mut adjusted = Vec::with_capacity(sequence.len() + 1);
        let mut current: Quarters = Ratio::from_integer(0);
        let overflow =
            |state: &State, current: Quarters| BarError::Overflow(format!("{} after {}", state, current));

        for state in sequence {
            let next = checked_add(current, state.duration.as_quarters())
                .ok_or_else(|| overflow(state, current))?;
            if next <= target {
                adjusted.push(state.clone());
                current = next;
                continue;
            }

            let remaining = checked_sub(target, current).ok_or_else(|| overflow(state, current))?;
            if let Some(remaining) = Duration::positive(remaining) {
                adjusted.push(state.with_duration(remaining));
                current = target;
            }
            break;
        }

        let shortfall = checked_sub(target, current)
            .ok_or_else(|| BarError::Overflow(format!("{} short of {}", current, target)))?;
        if let Some(shortfall) = Duration::positive(shortfall) {
            adjusted.push(State::rest(shortfall));
        }

        Ok(adjusted)
    }
}

/// Fits a sequence to `num_bars` bars of `quarter_notes_per_bar` quarter notes each.
pub fn enforce_bars(
    sequence: &[State],
    num_bars: u32,
    quarter_notes_per_bar: Quarters,
) -> Result<Vec<State>, BarError> {
    BarBudget::new(num_bars, quarter_notes_per_bar)?.enforce(sequence)
}
