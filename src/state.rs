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
use std::fmt;
use std::str::FromStr;

use num_rational::Ratio;
use serde::{Deserialize, Serialize};

/// Exact quarter-note quantities.
pub type Quarters = Ratio<i64>;

/// The label used for rests in serialized sequences.
pub const REST_LABEL: &str = "Rest";

/// Largest number of decimal places read exactly when parsing a duration. Longer
/// decimals are treated as floats and snapped to a nearby fraction.
const MAX_DECIMAL_PLACES: usize = 12;

/// Largest denominator a float duration is snapped to.
const MAX_FLOAT_DENOMINATOR: i64 = 1 << 20;

/// Errors produced while building or parsing durations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DurationError {
    #[error("duration must be strictly positive, got {0}")]
    NotPositive(String),

    #[error("unable to parse duration '{0}'")]
    Invalid(String),
}

/// A note label: either a pitch name (such as `C5` or `G#4`) or a rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Symbol {
    Rest,
    Pitch(String),
}

impl Symbol {
    /// Creates a pitched symbol. The rest label is recognized and mapped to [Symbol::Rest].
    pub fn pitch(name: &str) -> Symbol {
        Symbol::from(name)
    }

    /// Returns true if the symbol is a rest.
    pub fn is_rest(&self) -> bool {
        matches!(self, Symbol::Rest)
    }

    /// The serialized label of the symbol.
    pub fn label(&self) -> &str {
        match self {
            Symbol::Rest => REST_LABEL,
            Symbol::Pitch(name) => name,
        }
    }
}

impl From<&str> for Symbol {
    fn from(label: &str) -> Self {
        if label.eq_ignore_ascii_case(REST_LABEL) {
            Symbol::Rest
        } else {
            Symbol::Pitch(label.to_string())
        }
    }
}

impl From<String> for Symbol {
    fn from(label: String) -> Self {
        if label.eq_ignore_ascii_case(REST_LABEL) {
            Symbol::Rest
        } else {
            Symbol::Pitch(label)
        }
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        match symbol {
            Symbol::Rest => REST_LABEL.to_string(),
            Symbol::Pitch(name) => name,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A strictly positive length measured in quarter notes. Durations are exact
/// rationals, so two durations are the same only if they are equal as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawDuration", into = "RawDuration")]
pub struct Duration(Quarters);

impl Duration {
    /// Creates a duration of numer/denom quarter notes.
    pub fn new(numer: i64, denom: i64) -> Result<Duration, DurationError> {
        let quarters =
            ratio(numer, denom).ok_or_else(|| DurationError::Invalid(format!("{}/{}", numer, denom)))?;
        Duration::from_ratio(quarters)
    }

    /// Creates a duration of a whole number of quarter notes.
    pub fn quarters(quarters: i64) -> Result<Duration, DurationError> {
        Duration::from_ratio(Ratio::from_integer(quarters))
    }

    /// Creates a duration from an exact ratio of quarter notes.
    pub fn from_ratio(quarters: Quarters) -> Result<Duration, DurationError> {
        Duration::positive(quarters).ok_or_else(|| DurationError::NotPositive(quarters.to_string()))
    }

    /// Returns the duration if the ratio is strictly positive.
    pub(crate) fn positive(quarters: Quarters) -> Option<Duration> {
        // Ratio keeps its denominator positive, so the sign lives in the numerator.
        if *quarters.numer() > 0 {
            Some(Duration(quarters))
        } else {
            None
        }
    }

    /// The exact number of quarter notes.
    pub fn as_quarters(&self) -> Quarters {
        self.0
    }

    /// An approximation of the duration, for display and logging.
    pub fn as_f64(&self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }

    /// Returns true if the duration can be written as a finite decimal.
    fn is_decimal(&self) -> bool {
        let mut denom = *self.0.denom();
        while denom % 2 == 0 {
            denom /= 2;
        }
        while denom % 5 == 0 {
            denom /= 5;
        }
        denom == 1
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.numer())
        } else if self.is_decimal() {
            write!(f, "{}", self.as_f64())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl FromStr for Duration {
    type Err = DurationError;

    /// Parses `2`, `0.75` or `1/3`. Decimals of up to twelve places are read exactly,
    /// so `0.1` is one tenth. Longer ones are snapped to the closest continued
    /// fraction convergent with a denominator of at most 2^20, so the float printout
    /// of a triplet, `0.3333333333333333`, reads as 1/3.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || DurationError::Invalid(s.to_string());

        let quarters = match trimmed.split_once('/') {
            Some((numer, denom)) => {
                let numer: i64 = numer.trim().parse().map_err(|_| invalid())?;
                let denom: i64 = denom.trim().parse().map_err(|_| invalid())?;
                ratio(numer, denom).ok_or_else(invalid)?
            }
            None => match parse_decimal(trimmed) {
                Some(quarters) => quarters,
                None => {
                    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
                    approximate(value).ok_or_else(invalid)?
                }
            },
        };

        Duration::from_ratio(quarters)
    }
}

impl TryFrom<f64> for Duration {
    type Error = DurationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(DurationError::Invalid(value.to_string()));
        }
        // f64's Display never uses exponent notation, so this is always a plain decimal.
        Duration::from_str(&value.to_string())
    }
}

/// Reads a plain decimal number as an exact ratio.
fn parse_decimal(s: &str) -> Option<Quarters> {
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    if fraction.len() > MAX_DECIMAL_PLACES || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let numer: i64 = format!("{}{}", whole, fraction).parse().ok()?;
    let denom = 10i64.checked_pow(u32::try_from(fraction.len()).ok()?)?;
    ratio(numer, denom)
}

/// Snaps a float to its last continued fraction convergent whose denominator is at
/// most [MAX_FLOAT_DENOMINATOR].
fn approximate(value: f64) -> Option<Quarters> {
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return None;
    }

    let mut term = value.floor();
    let (mut numer, mut prev_numer) = (term as i64, 1i64);
    let (mut denom, mut prev_denom) = (1i64, 0i64);
    let mut remainder = value - term;
    for _ in 0..64 {
        if remainder <= 0.0 {
            break;
        }
        let inverse = 1.0 / remainder;
        if inverse >= i64::MAX as f64 {
            break;
        }
        term = inverse.floor();

        let a = term as i64;
        let next_denom = match a.checked_mul(denom).and_then(|d| d.checked_add(prev_denom)) {
            Some(next_denom) if next_denom <= MAX_FLOAT_DENOMINATOR => next_denom,
            _ => break,
        };
        let next_numer = match a.checked_mul(numer).and_then(|n| n.checked_add(prev_numer)) {
            Some(next_numer) => next_numer,
            None => break,
        };

        (prev_numer, numer) = (numer, next_numer);
        (prev_denom, denom) = (denom, next_denom);
        remainder = inverse - term;
    }

    ratio(numer, denom)
}

/// Builds a reduced ratio, or None if the denominator is zero or the reduced ratio
/// doesn't fit.
fn ratio(numer: i64, denom: i64) -> Option<Quarters> {
    if denom == 0 {
        return None;
    }
    narrow(Ratio::new(i128::from(numer), i128::from(denom)))
}

/// Converts a reduced wide ratio back to quarters.
fn narrow(wide: Ratio<i128>) -> Option<Quarters> {
    Some(Ratio::new_raw(
        i64::try_from(*wide.numer()).ok()?,
        i64::try_from(*wide.denom()).ok()?,
    ))
}

/// Adds two quantities. Returns None if the exact sum doesn't fit.
pub(crate) fn checked_add(a: Quarters, b: Quarters) -> Option<Quarters> {
    combine(a, b, 1)
}

/// Subtracts `b` from `a`. Returns None if the exact difference doesn't fit.
pub(crate) fn checked_sub(a: Quarters, b: Quarters) -> Option<Quarters> {
    combine(a, b, -1)
}

/// Multiplies a quantity by a whole number. Returns None if the product doesn't fit.
pub(crate) fn checked_scale(a: Quarters, factor: i64) -> Option<Quarters> {
    narrow(Ratio::new(
        i128::from(*a.numer()) * i128::from(factor),
        i128::from(*a.denom()),
    ))
}

/// Computes a + sign * b in i128, where no intermediate product can overflow.
fn combine(a: Quarters, b: Quarters, sign: i128) -> Option<Quarters> {
    let (a_numer, a_denom) = (i128::from(*a.numer()), i128::from(*a.denom()));
    let (b_numer, b_denom) = (i128::from(*b.numer()), i128::from(*b.denom()));
    narrow(Ratio::new(
        a_numer * b_denom + sign * b_numer * a_denom,
        a_denom * b_denom,
    ))
}

/// The serialized shapes of a duration.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl TryFrom<RawDuration> for Duration {
    type Error = DurationError;

    fn try_from(raw: RawDuration) -> Result<Self, Self::Error> {
        match raw {
            RawDuration::Integer(quarters) => Duration::quarters(quarters),
            RawDuration::Float(quarters) => Duration::try_from(quarters),
            RawDuration::Text(text) => Duration::from_str(&text),
        }
    }
}

impl From<Duration> for RawDuration {
    fn from(duration: Duration) -> Self {
        if duration.0.is_integer() {
            return RawDuration::Integer(*duration.0.numer());
        }

        let approximation = duration.as_f64();
        if duration.is_decimal() && Duration::try_from(approximation) == Ok(duration) {
            RawDuration::Float(approximation)
        } else {
            RawDuration::Text(format!("{}/{}", duration.0.numer(), duration.0.denom()))
        }
    }
}

/// A single element of a melody: what sounds (or doesn't) and for how long.
/// Serialized as a `[label, duration]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Symbol, Duration)", into = "(Symbol, Duration)")]
pub struct State {
    pub symbol: Symbol,
    pub duration: Duration,
}

impl State {
    pub fn new(symbol: Symbol, duration: Duration) -> State {
        State { symbol, duration }
    }

    /// A pitched state.
    pub fn note(pitch: &str, duration: Duration) -> State {
        State::new(Symbol::pitch(pitch), duration)
    }

    /// A rest state.
    pub fn rest(duration: Duration) -> State {
        State::new(Symbol::Rest, duration)
    }

    pub fn is_rest(&self) -> bool {
        self.symbol.is_rest()
    }

    /// The same label held for a different duration.
    pub fn with_duration(&self, duration: Duration) -> State {
        State::new(self.symbol.clone(), duration)
    }
}

impl From<(Symbol, Duration)> for State {
    fn from((symbol, duration): (Symbol, Duration)) -> Self {
        State::new(symbol, duration)
    }
}

impl From<State> for (Symbol, Duration) {
    fn from(state: State) -> Self {
        (state.symbol, state.duration)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.symbol, self.duration)
    }
}

/// The total duration of a sequence of states. Returns None if the exact total is
/// too large to represent.
pub fn total_duration(states: &[State]) -> Option<Quarters> {
    states.iter().try_fold(Ratio::from_integer(0), |total, state| {
        checked_add(total, state.duration.as_quarters())
    })
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use num_rational::Ratio;

    use super::{total_duration, Duration, DurationError, State, Symbol};

    #[test]
    fn test_duration_parsing() {
        assert_eq!(Duration::new(1, 4), Duration::from_str("0.25"));
        assert_eq!(Duration::new(3, 2), Duration::from_str("1.5"));
        assert_eq!(Duration::new(1, 3), Duration::from_str("1/3"));
        assert_eq!(Duration::quarters(2), Duration::from_str(" 2 "));
        assert_eq!(Duration::new(1, 10), Duration::try_from(0.1_f64));

        assert!(matches!(
            Duration::from_str("0"),
            Err(DurationError::NotPositive(_))
        ));
        assert!(matches!(
            Duration::from_str("-1.5"),
            Err(DurationError::NotPositive(_))
        ));
        assert!(matches!(
            Duration::from_str("1/0"),
            Err(DurationError::Invalid(_))
        ));
        assert!(matches!(
            Duration::from_str("quarter"),
            Err(DurationError::Invalid(_))
        ));
        assert!(Duration::try_from(f64::NAN).is_err());
    }

    #[test]
    fn test_duration_identity_is_exact() {
        // 2/4 and 0.5 are the same duration, 1/3 and 0.333 are not.
        assert_eq!(Duration::new(2, 4), Duration::from_str("0.5"));
        assert_ne!(Duration::new(1, 3), Duration::from_str("0.333"));
    }

    #[test]
    fn test_duration_display() {
        assert_eq!("2", Duration::quarters(2).unwrap().to_string());
        assert_eq!("0.75", Duration::new(3, 4).unwrap().to_string());
        assert_eq!("1/3", Duration::new(1, 3).unwrap().to_string());
    }

    #[test]
    fn test_symbol_labels() {
        assert_eq!(Symbol::Rest, Symbol::pitch("Rest"));
        assert_eq!(Symbol::Rest, Symbol::pitch("rest"));
        assert_eq!(Symbol::Pitch("G#4".to_string()), Symbol::pitch("G#4"));
        assert!(!Symbol::pitch("C5").is_rest());
    }

    #[test]
    fn test_state_serialization() {
        let state = State::note("C5", Duration::new(1, 2).unwrap());
        assert_eq!(r#"["C5",0.5]"#, serde_json::to_string(&state).unwrap());

        let triplet = State::rest(Duration::new(1, 3).unwrap());
        assert_eq!(r#"["Rest","1/3"]"#, serde_json::to_string(&triplet).unwrap());

        let states: Vec<State> =
            serde_json::from_str(r#"[["A5", 1.0], ["G#5", 0.25], ["Rest", 2], ["C5", "1/3"]]"#)
                .unwrap();
        assert_eq!(
            vec![
                State::note("A5", Duration::quarters(1).unwrap()),
                State::note("G#5", Duration::new(1, 4).unwrap()),
                State::rest(Duration::quarters(2).unwrap()),
                State::note("C5", Duration::new(1, 3).unwrap()),
            ],
            states
        );

        assert!(serde_json::from_str::<State>(r#"["C5", 0]"#).is_err());
        assert!(serde_json::from_str::<State>(r#"["C5", -0.5]"#).is_err());
    }

    #[test]
    fn test_total_duration() {
        let states = vec![
            State::note("C5", Duration::new(1, 2).unwrap()),
            State::rest(Duration::new(1, 3).unwrap()),
            State::note("D5", Duration::quarters(1).unwrap()),
        ];
        assert_eq!(Some(Ratio::new(11, 6)), total_duration(&states));
        assert_eq!(Some(Ratio::from_integer(0)), total_duration(&[]));

        let huge = vec![
            State::note("C5", Duration::new(1, 999_999_999_989).unwrap()),
            State::note("D5", Duration::new(1, 999_999_999_959).unwrap()),
        ];
        assert_eq!(None, total_duration(&huge));
    }

    #[test]
    fn test_float_durations_snap_to_fractions() {
        let triplet: State = serde_json::from_str(r#"["C5", 0.3333333333333333]"#).unwrap();
        assert_eq!(State::note("C5", Duration::new(1, 3).unwrap()), triplet);

        let sum: State = serde_json::from_str(r#"["C5", 0.30000000000000004]"#).unwrap();
        assert_eq!(Duration::new(3, 10).unwrap(), sum.duration);

        assert_eq!(Duration::new(2, 3), Duration::try_from(2.0_f64 / 3.0));
        assert_eq!(Duration::new(1, 3), Duration::from_str("0.3333333333333333"));
        assert_eq!(Duration::new(1, 8192), Duration::try_from(1.0_f64 / 8192.0));

        // Too small for any fraction with a bounded denominator.
        assert!(matches!(
            Duration::try_from(1e-300_f64),
            Err(DurationError::NotPositive(_))
        ));
        assert!(Duration::try_from(f64::INFINITY).is_err());
        assert!(Duration::try_from(1e30_f64).is_err());
    }

    #[test]
    fn test_serialized_durations_read_back() {
        let mut durations = Vec::new();
        for exponent in 0..20 {
            durations.push(Duration::new(1, 1 << exponent).unwrap());
            durations.push(Duration::new(3, 1 << exponent).unwrap());
        }
        for exponent in 0..10u32 {
            durations.push(Duration::new(1, 5i64.pow(exponent)).unwrap());
            durations.push(Duration::new(7, 10i64.pow(exponent)).unwrap());
        }
        durations.push(Duration::new(1_000_000_000_001, 1_000_000_000_000).unwrap());
        durations.push(Duration::new(5, 7).unwrap());

        for duration in durations {
            let state = State::note("C5", duration);
            let json = serde_json::to_string(&state).unwrap();
            let parsed: State = serde_json::from_str(&json)
                .unwrap_or_else(|e| panic!("{} should read back: {}", json, e));
            assert_eq!(state, parsed, "{}", json);
        }

        let tiny = State::note("C5", Duration::new(1, 8192).unwrap());
        assert_eq!(
            tiny,
            serde_json::from_str(&serde_json::to_string(&tiny).unwrap()).unwrap()
        );
    }

    #[test]
    fn test_overflowing_durations_are_errors() {
        assert!(matches!(
            Duration::from_str("-9223372036854775808/-1"),
            Err(DurationError::Invalid(_))
        ));
        assert!(matches!(
            Duration::new(i64::MIN, -1),
            Err(DurationError::Invalid(_))
        ));
        assert_eq!(
            Duration::new(1, i64::MAX),
            Duration::from_str("-1/-9223372036854775807")
        );
    }
}
