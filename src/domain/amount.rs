//! 18-decimal fixed-point amounts over 256-bit unsigned integers.
//!
//! All token quantities and prices in the engine flow through this type.
//! Products are always formed before dividing by the scale so that no
//! precision is lost in price × amount conversions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ArithmeticError;

/// Number of implied decimal places
pub const DECIMALS: u32 = 18;

/// 10^18
const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Basis points in one whole (100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

type ArithResult<T> = std::result::Result<T, ArithmeticError>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedPointAmount(U256);

impl FixedPointAmount {
    pub const ZERO: Self = Self(U256::ZERO);
    pub const ONE: Self = Self(SCALE);

    /// Wrap raw base units (already scaled by 10^18)
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Raw base units
    pub const fn raw(&self) -> U256 {
        self.0
    }

    /// Whole token units, e.g. `from_units(1000)` is 1000.0
    pub fn from_units(units: u64) -> Self {
        Self(U256::from(units) * SCALE)
    }

    /// `numerator / denominator` as a fixed-point value, e.g. `from_ratio(95, 100)` is 0.95
    pub fn from_ratio(numerator: u64, denominator: u64) -> ArithResult<Self> {
        Self::from_units(numerator).checked_div_int(denominator)
    }

    pub fn from_decimal(value: Decimal) -> ArithResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ArithmeticError::Parse {
                input: value.to_string(),
                reason: "negative amounts are not allowed".to_string(),
            });
        }

        let mantissa = U256::from(value.mantissa().unsigned_abs());
        let scale = value.scale();
        let raw = if scale <= DECIMALS {
            mantissa
                .checked_mul(pow10(DECIMALS - scale))
                .ok_or(ArithmeticError::Overflow {
                    operation: "from_decimal",
                })?
        } else {
            // Digits beyond 18 decimals are truncated
            mantissa / pow10(scale - DECIMALS)
        };

        Ok(Self(raw))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Self) -> ArithResult<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow { operation: "add" })
    }

    /// Fails with `Underflow` if the result would be negative
    pub fn checked_sub(self, other: Self) -> ArithResult<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Underflow { operation: "sub" })
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiply by an integer count (e.g. levels × amount per level)
    pub fn checked_mul_int(self, factor: u64) -> ArithResult<Self> {
        self.0
            .checked_mul(U256::from(factor))
            .map(Self)
            .ok_or(ArithmeticError::Overflow {
                operation: "mul_int",
            })
    }

    /// Divide by an integer count, rounding down
    pub fn checked_div_int(self, divisor: u64) -> ArithResult<Self> {
        if divisor == 0 {
            return Err(ArithmeticError::DivisionByZero {
                operation: "div_int",
            });
        }
        Ok(Self(self.0 / U256::from(divisor)))
    }

    /// `self × other`, rescaled: (a × b) ÷ 10^18
    pub fn mul_scaled(self, other: Self) -> ArithResult<Self> {
        self.mul_div(other, Self::ONE)
    }

    /// `self ÷ other`, rescaled: (a × 10^18) ÷ b
    pub fn div_scaled(self, other: Self) -> ArithResult<Self> {
        self.mul_div(Self::ONE, other)
    }

    /// (self × numerator) ÷ denominator, multiplying first
    pub fn mul_div(self, numerator: Self, denominator: Self) -> ArithResult<Self> {
        if denominator.is_zero() {
            return Err(ArithmeticError::DivisionByZero {
                operation: "mul_div",
            });
        }
        let product = self
            .0
            .checked_mul(numerator.0)
            .ok_or(ArithmeticError::Overflow {
                operation: "mul_div",
            })?;
        Ok(Self(product / denominator.0))
    }

    /// Absolute distance between two amounts
    pub fn abs_diff(self, other: Self) -> Self {
        if self >= other {
            Self(self.0 - other.0)
        } else {
            Self(other.0 - self.0)
        }
    }

    /// Relative deviation of `self` from `reference`, in basis points (rounded down)
    pub fn deviation_bps(self, reference: Self) -> ArithResult<u64> {
        if reference.is_zero() {
            return Err(ArithmeticError::DivisionByZero {
                operation: "deviation_bps",
            });
        }
        let scaled = self
            .abs_diff(reference)
            .0
            .checked_mul(U256::from(BPS_DENOMINATOR))
            .ok_or(ArithmeticError::Overflow {
                operation: "deviation_bps",
            })?;
        Ok(saturating_u64(scaled / reference.0))
    }

    /// `self × bps / 10_000`
    pub fn apply_bps(self, bps: u64) -> ArithResult<Self> {
        let product = self
            .0
            .checked_mul(U256::from(bps))
            .ok_or(ArithmeticError::Overflow {
                operation: "apply_bps",
            })?;
        Ok(Self(product / U256::from(BPS_DENOMINATOR)))
    }
}

fn pow10(exp: u32) -> U256 {
    (0..exp).fold(U256::from(1u64), |acc, _| acc * U256::from(10u64))
}

fn saturating_u64(value: U256) -> u64 {
    let limbs = value.as_limbs();
    if limbs[1..].iter().any(|limb| *limb != 0) {
        u64::MAX
    } else {
        limbs[0]
    }
}

impl PartialOrd for FixedPointAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FixedPointAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for FixedPointAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac.is_zero() {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0>width$}", frac.to_string(), width = DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl fmt::Debug for FixedPointAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPointAmount({})", self)
    }
}

impl FromStr for FixedPointAmount {
    type Err = ArithmeticError;

    /// Parses human decimals such as `"1000"`, `"0.95"` or `"1_000.5"`
    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        let parse_err = |reason: &str| ArithmeticError::Parse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let cleaned: String = input.trim().chars().filter(|c| *c != '_').collect();
        if cleaned.is_empty() {
            return Err(parse_err("empty"));
        }

        let (whole, frac) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };

        if frac.len() > DECIMALS as usize {
            return Err(parse_err("more than 18 decimal places"));
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(parse_err("not an unsigned decimal"));
        }

        let whole = if whole.is_empty() { "0" } else { whole };
        let whole = U256::from_str_radix(whole, 10).map_err(|e| parse_err(&e.to_string()))?;
        let frac_raw = if frac.is_empty() {
            U256::ZERO
        } else {
            let padded = format!("{:0<width$}", frac, width = DECIMALS as usize);
            U256::from_str_radix(&padded, 10).map_err(|e| parse_err(&e.to_string()))?
        };

        whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_raw))
            .map(Self)
            .ok_or_else(|| parse_err("exceeds 256-bit range"))
    }
}

impl Serialize for FixedPointAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Wire forms accepted for an amount: an exact decimal string, or a JSON
/// number read through `Decimal` (28 significant digits)
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(Decimal),
}

impl<'de> Deserialize<'de> for FixedPointAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match AmountRepr::deserialize(deserializer)? {
            AmountRepr::Text(raw) => raw.parse().map_err(de::Error::custom),
            AmountRepr::Number(value) => Self::from_decimal(value).map_err(de::Error::custom),
        }
    }
}
