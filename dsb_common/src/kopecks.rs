use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const RUB_CURRENCY_CODE: &str = "RUB";

//--------------------------------------     Kopecks       -----------------------------------------------------------
/// A monetary amount in minor currency units (1/100 ₽). All amounts flowing through the order and
/// ledger core are stored in this form; decimal strings are produced by [`Kopecks::format_decimal`],
/// which slices the digit string and never divides floats.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Kopecks(i64);

op!(binary Kopecks, Add, add);
op!(binary Kopecks, Sub, sub);
op!(inplace Kopecks, SubAssign, sub_assign);
op!(unary Kopecks, Neg, neg);

impl Mul<i64> for Kopecks {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Kopecks {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in kopecks: {0}")]
pub struct KopecksConversionError(String);

impl From<i64> for Kopecks {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Kopecks {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Kopecks {}

impl TryFrom<u64> for Kopecks {
    type Error = KopecksConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(KopecksConversionError(format!("Value {} is too large to convert to Kopecks", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Kopecks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}₽", self.format_decimal())
    }
}

impl Kopecks {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rubles(rubles: i64) -> Self {
        Self(rubles * 100)
    }

    /// Parses a decimal amount string (`"1234.5"`, `"1990.0000"`, `"-12"`) into kopecks by digit
    /// manipulation. Fractional digits beyond the second are truncated. Returns `None` for
    /// anything that is not a plain decimal number.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        let s = s.trim();
        let (sign, s) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let cents: String = format!("{frac}00").chars().take(2).collect();
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().ok()? };
        let cents = cents.parse::<i64>().ok()?;
        Some(Self(sign * (whole.checked_mul(100)?.checked_add(cents)?)))
    }

    /// The whole-rouble decimal string for this amount, e.g. `123456` → `"1234.56"`.
    ///
    /// Marketplaces report prices as integers with two implicit decimal places. Splitting the digit
    /// string keeps the round-trip exact for arbitrarily large amounts, where float division would
    /// start dropping cents.
    pub fn format_decimal(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.0.unsigned_abs().to_string();
        let (whole, cents) = if digits.len() > 2 {
            let (w, c) = digits.split_at(digits.len() - 2);
            (w.to_string(), c.to_string())
        } else {
            ("0".to_string(), format!("{digits:0>2}"))
        };
        format!("{sign}{whole}.{cents}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_splits_two_implicit_decimals() {
        assert_eq!(Kopecks::from(123456).format_decimal(), "1234.56");
        assert_eq!(Kopecks::from(100).format_decimal(), "1.00");
        assert_eq!(Kopecks::from(99).format_decimal(), "0.99");
        assert_eq!(Kopecks::from(5).format_decimal(), "0.05");
        assert_eq!(Kopecks::from(0).format_decimal(), "0.00");
    }

    #[test]
    fn format_is_exact_for_large_amounts() {
        // 15 digits and beyond stay exact. f64 division would lose the trailing cents here.
        assert_eq!(Kopecks::from(123_456_789_012_345).format_decimal(), "1234567890123.45");
        assert_eq!(Kopecks::from(999_999_999_999_999).format_decimal(), "9999999999999.99");
        assert_eq!(Kopecks::from(i64::MAX).format_decimal(), "92233720368547758.07");
    }

    #[test]
    fn format_negative_amounts() {
        assert_eq!(Kopecks::from(-12345).format_decimal(), "-123.45");
        assert_eq!(Kopecks::from(-7).format_decimal(), "-0.07");
    }

    #[test]
    fn parse_decimal_strings() {
        assert_eq!(Kopecks::parse_decimal("1234.56"), Some(Kopecks::from(123456)));
        assert_eq!(Kopecks::parse_decimal("1990.0000"), Some(Kopecks::from(199000)));
        assert_eq!(Kopecks::parse_decimal("1234.5"), Some(Kopecks::from(123450)));
        assert_eq!(Kopecks::parse_decimal("12"), Some(Kopecks::from(1200)));
        assert_eq!(Kopecks::parse_decimal("-12.07"), Some(Kopecks::from(-1207)));
        assert_eq!(Kopecks::parse_decimal("0.999"), Some(Kopecks::from(99)));
        assert_eq!(Kopecks::parse_decimal("abc"), None);
        assert_eq!(Kopecks::parse_decimal(""), None);
        assert_eq!(Kopecks::parse_decimal("12,50"), None);
    }

    #[test]
    fn arithmetic_chains() {
        let a = Kopecks::from(1000);
        let b = Kopecks::from(250);
        assert_eq!(a + b, Kopecks::from(1250));
        assert_eq!(a - b, Kopecks::from(750));
        assert_eq!(-b, Kopecks::from(-250));
        assert_eq!(b * 4, Kopecks::from(1000));
        let total: Kopecks = [a, b, b].into_iter().sum();
        assert_eq!(total, Kopecks::from(1500));
    }
}
