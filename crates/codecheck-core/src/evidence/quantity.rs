//! Typed access to opaque evidence values.
//!
//! Evidence values arrive as arbitrary JSON scalars. [`Observed::from_value`]
//! classifies them on demand; numeric magnitudes use [`FixedPoint`] so that
//! comparisons are exact (`"799.999999mm"` is strictly below `"800mm"`).
//!
//! Decimal literals in text are taken as written and rejected past six
//! fractional digits. JSON numbers are binary floats, so they are rounded
//! half away from zero to six digits instead (`914.4000000000001` →
//! `914.4`).

use std::cmp::Ordering;

use serde_json::Value;

/// Decimal number with six fractional digits, stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedPoint(i128);

impl FixedPoint {
    pub const SCALE_DIGITS: usize = 6;
    const SCALE: i128 = 1_000_000;

    pub fn from_int(value: i64) -> Self {
        Self(i128::from(value) * Self::SCALE)
    }

    /// Round a float to six fractional digits, half away from zero.
    /// Non-finite and out-of-range values have no fixed-point form.
    pub fn from_f64(value: f64) -> Option<Self> {
        let scaled = (value * Self::SCALE as f64).round();
        if !scaled.is_finite() || scaled.abs() >= 1e30 {
            return None;
        }
        Some(Self(scaled as i128))
    }

    /// Fixed-point form of a JSON number: integers exactly, floats rounded
    /// with [`FixedPoint::from_f64`].
    pub fn from_number(number: &serde_json::Number) -> Option<Self> {
        if let Some(i) = number.as_i64() {
            return Some(Self::from_int(i));
        }
        if let Some(u) = number.as_u64() {
            return i128::from(u).checked_mul(Self::SCALE).map(Self);
        }
        number.as_f64().and_then(Self::from_f64)
    }

    /// Parse a plain decimal literal (`"-12"`, `"900"`, `"0.75"`).
    ///
    /// Exponents, separators and more than six fractional digits are
    /// rejected rather than rounded.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
            || frac_part.len() > Self::SCALE_DIGITS
            || int_part.len() > 24
        {
            return None;
        }
        let int_value: i128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let mut frac_value: i128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().ok()?
        };
        for _ in frac_part.len()..Self::SCALE_DIGITS {
            frac_value *= 10;
        }
        let magnitude = int_value.checked_mul(Self::SCALE)?.checked_add(frac_value)?;
        Some(Self(if negative { -magnitude } else { magnitude }))
    }
}

impl std::fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let int = abs / Self::SCALE as u128;
        let frac = abs % Self::SCALE as u128;
        if frac == 0 {
            write!(f, "{sign}{int}")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{sign}{int}.{}", digits.trim_end_matches('0'))
        }
    }
}

/// Units recognised on evidence values and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Millimetre,
    Centimetre,
    Metre,
    SquareMetre,
    Inch,
    Foot,
    Degree,
    Percent,
}

impl Unit {
    pub fn parse(text: &str) -> Option<Self> {
        let unit = match text.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Self::Millimetre,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Self::Centimetre,
            "m" | "meter" | "meters" | "metre" | "metres" => Self::Metre,
            "m2" | "m²" | "sqm" | "sq m" | "square meters" | "square metres" => Self::SquareMetre,
            "in" | "inch" | "inches" | "\"" => Self::Inch,
            "ft" | "foot" | "feet" | "'" => Self::Foot,
            "deg" | "degree" | "degrees" | "°" => Self::Degree,
            "%" | "percent" => Self::Percent,
            _ => return None,
        };
        Some(unit)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Millimetre => "mm",
            Self::Centimetre => "cm",
            Self::Metre => "m",
            Self::SquareMetre => "m2",
            Self::Inch => "in",
            Self::Foot => "ft",
            Self::Degree => "deg",
            Self::Percent => "%",
        }
    }
}

/// A magnitude with an optional explicit unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    pub magnitude: FixedPoint,
    pub unit: Option<Unit>,
}

/// Both sides carried explicit, different units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitMismatch {
    pub observed: Unit,
    pub required: Unit,
}

impl Quantity {
    /// Parse `"900"`, `"900mm"`, `"0.9 m"`, `"45°"`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let split = text
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+'))
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let (number, rest) = text.split_at(split);
        let magnitude = FixedPoint::parse(number)?;
        let rest = rest.trim();
        let unit = if rest.is_empty() {
            None
        } else {
            Some(Unit::parse(rest)?)
        };
        Some(Self { magnitude, unit })
    }

    /// Compare magnitudes. Units are only checked when both sides state one;
    /// no conversion is ever attempted.
    pub fn compare(&self, required: &Quantity) -> Result<Ordering, UnitMismatch> {
        match (self.unit, required.unit) {
            (Some(observed), Some(req)) if observed != req => Err(UnitMismatch {
                observed,
                required: req,
            }),
            _ => Ok(self.magnitude.cmp(&required.magnitude)),
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit {
            Some(unit) => write!(f, "{}{}", self.magnitude, unit.symbol()),
            None => write!(f, "{}", self.magnitude),
        }
    }
}

/// Classified evidence value.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Quantity(Quantity),
    Flag(bool),
    Text(String),
}

impl Observed {
    /// Classify a JSON scalar. Containers and null carry no single value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Flag(*b)),
            Value::Number(n) => Some(
                FixedPoint::from_number(n)
                    .map(|magnitude| Self::Quantity(Quantity { magnitude, unit: None }))
                    .unwrap_or_else(|| Self::Text(n.to_string())),
            ),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(Self::Flag(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(Self::Flag(false))
                } else if let Some(q) = Quantity::parse(trimmed) {
                    Some(Self::Quantity(q))
                } else {
                    Some(Self::Text(trimmed.to_string()))
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl std::fmt::Display for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}
