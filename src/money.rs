use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize, Serializer};

use crate::constants::MAX_AMOUNT_CENTS;

/// Money amount represented as **integer cents**.
///
/// All sums are computed on the integer value, so `10.10 + 5.05` is exactly
/// `15.15`. Conversion to a JSON number happens only when serializing.
///
/// ```rust
/// use money_manager_server::money::Cents;
///
/// let a: Cents = "10.10".parse().unwrap();
/// let b: Cents = "5.05".parse().unwrap();
/// assert_eq!((a + b).cents(), 1515);
/// assert_eq!((a + b).to_string(), "15.15");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Cents(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is not a number")]
    NotANumber,
    #[error("amount cannot have more than two decimal places")]
    TooPrecise,
    #[error("amount is too large")]
    OutOfRange,
}

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Value in major units, for serialization and ratios.
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Converts a JSON number in major units, rejecting sub-cent precision.
    pub fn from_major(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NotANumber);
        }
        let scaled = value * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(AmountError::TooPrecise);
        }
        if rounded.abs() > MAX_AMOUNT_CENTS as f64 {
            return Err(AmountError::OutOfRange);
        }
        Ok(Self(rounded as i64))
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Accepts `12`, `12.5`, `12.50`, `-3.1`, and `,` as decimal separator.
impl FromStr for Cents {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, fraction) = match digits.split_once(['.', ',']) {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::NotANumber);
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AmountError::NotANumber);
        }
        if fraction.len() > 2 {
            return Err(AmountError::TooPrecise);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::OutOfRange)?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| AmountError::NotANumber)? * 10,
            _ => fraction.parse().map_err(|_| AmountError::NotANumber)?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(fraction))
            .filter(|v| *v <= MAX_AMOUNT_CENTS)
            .ok_or(AmountError::OutOfRange)?;

        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Cents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

/// Amount as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl TryFrom<&AmountInput> for Cents {
    type Error = AmountError;

    fn try_from(value: &AmountInput) -> Result<Self, Self::Error> {
        match value {
            AmountInput::Number(n) => Cents::from_major(*n),
            AmountInput::Text(s) => s.parse(),
        }
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Self::Output {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Cents;

    fn sub(self, rhs: Cents) -> Self::Output {
        Cents(self.0 - rhs.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Self {
        iter.fold(Cents::ZERO, Add::add)
    }
}
