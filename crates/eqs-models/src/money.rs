//! Fixed-point money type.
//!
//! All cash, price and PnL amounts are stored as `i64` micros
//! (1 USD = 1_000_000). Raw `i64` money is error-prone: it mixes silently
//! with share counts and day counters. `Micros` wraps the raw value so the
//! type system keeps monetary amounts separate from plain integers.
//!
//! Percent-valued quantities (slippage, position caps, PnL percentages)
//! are carried as `i64` basis points (1 bps = 0.01%). Conversions between
//! money and bps go through `i128` intermediates so no intermediate
//! product can overflow.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money scale: micros (1e-6 USD).
pub const MICROS_SCALE: i64 = 1_000_000;

/// Basis-point scale: 10_000 bps = 100%.
pub const BPS_SCALE: i64 = 10_000;

/// A fixed-point monetary amount at 1e-6 scale.
///
/// Construct with [`Micros::new`] (raw micros) or [`Micros::from_dollars`]
/// (whole dollars). There is deliberately no `From<i64>` impl: a raw
/// integer becoming money must be an explicit decision at the call site.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);
    pub const MAX: Micros = Micros(i64::MAX);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Whole dollars to micros. Saturates on overflow.
    #[inline]
    pub const fn from_dollars(dollars: i64) -> Self {
        Micros(dollars.saturating_mul(MICROS_SCALE))
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn saturating_add(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn abs(self) -> Micros {
        Micros(self.0.saturating_abs())
    }

    /// Per-unit price times an integer share count, with overflow detection.
    ///
    /// Returns `None` on overflow; callers decide policy (a buy whose
    /// notional overflows is a rejected order, not a clamped one).
    #[inline]
    pub fn checked_mul_qty(self, qty: i64) -> Option<Micros> {
        self.0.checked_mul(qty).map(Micros)
    }

    /// Per-unit price times an integer share count, clamped to the i64
    /// range. Used for valuation paths where saturation beats aborting.
    #[inline]
    pub fn mul_qty(self, qty: i64) -> Micros {
        Micros(clamp_i128((self.0 as i128) * (qty as i128)))
    }

    /// `self * bps / 10_000`, truncating toward zero.
    #[inline]
    pub fn mul_bps(self, bps: i64) -> Micros {
        Micros(clamp_i128((self.0 as i128) * (bps as i128) / (BPS_SCALE as i128)))
    }

    /// How many whole units of `price` this amount affords (floor).
    /// Zero when `price` is not strictly positive.
    #[inline]
    pub fn div_price(self, price: Micros) -> i64 {
        if price.0 <= 0 {
            return 0;
        }
        self.0 / price.0
    }

    /// Exact threshold test: `self / basis >= threshold_bps / 10_000`,
    /// evaluated as a cross multiplication in `i128` so no precision is
    /// lost to division. `basis` must be positive for a meaningful answer;
    /// a non-positive basis yields `false`.
    #[inline]
    pub fn at_least_bps_of(self, basis: Micros, threshold_bps: i64) -> bool {
        if basis.0 <= 0 {
            return false;
        }
        (self.0 as i128) * (BPS_SCALE as i128) >= (threshold_bps as i128) * (basis.0 as i128)
    }

    /// Exact threshold test: `self / basis <= threshold_bps / 10_000`.
    #[inline]
    pub fn at_most_bps_of(self, basis: Micros, threshold_bps: i64) -> bool {
        if basis.0 <= 0 {
            return false;
        }
        (self.0 as i128) * (BPS_SCALE as i128) <= (threshold_bps as i128) * (basis.0 as i128)
    }

    /// Approximate dollars as `f64`. Only for statistics and display —
    /// never feeds back into cash/price/PnL state.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MICROS_SCALE as f64
    }
}

/// `num / den` in basis points, truncating toward zero. 0 when `den` is 0.
#[inline]
pub fn ratio_bps(num: Micros, den: Micros) -> i64 {
    if den.0 == 0 {
        return 0;
    }
    clamp_i128((num.0 as i128) * (BPS_SCALE as i128) / (den.0 as i128))
}

#[inline]
fn clamp_i128(x: i128) -> i64 {
    if x > i64::MAX as i128 {
        i64::MAX
    } else if x < i64::MIN as i128 {
        i64::MIN
    } else {
        x as i64
    }
}

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl Neg for Micros {
    type Output = Micros;
    #[inline]
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Micros {
    #[inline]
    fn sub_assign(&mut self, rhs: Micros) {
        self.0 -= rhs.0;
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = abs / MICROS_SCALE as u64;
        let frac = abs % MICROS_SCALE as u64;
        if frac == 0 {
            write!(f, "{sign}{dollars}")
        } else {
            // trim trailing zeros from the fractional part
            let mut frac_str = format!("{frac:06}");
            while frac_str.ends_with('0') {
                frac_str.pop();
            }
            write!(f, "{sign}{dollars}.{frac_str}")
        }
    }
}

// ---------------------------------------------------------------------------
// Decimal-string parsing
// ---------------------------------------------------------------------------

/// Error from [`parse_micros`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMoneyError {
    Empty,
    InvalidDigit { raw: String },
    TooManyDecimals { raw: String },
    Overflow { raw: String },
}

impl std::fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMoneyError::Empty => write!(f, "empty money value"),
            ParseMoneyError::InvalidDigit { raw } => write!(f, "invalid money value '{raw}'"),
            ParseMoneyError::TooManyDecimals { raw } => {
                write!(f, "money value '{raw}' has more than 6 decimal places")
            }
            ParseMoneyError::Overflow { raw } => write!(f, "money value '{raw}' overflows"),
        }
    }
}

impl std::error::Error for ParseMoneyError {}

/// Parse a decimal string (e.g. `"102.5"`, `"-0.25"`) into micros exactly.
///
/// No floating point is involved: the integer and fractional parts are
/// decoded as integers and recombined at the 1e-6 scale. At most six
/// fractional digits are accepted.
pub fn parse_micros(raw: &str) -> Result<Micros, ParseMoneyError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ParseMoneyError::Empty);
    }

    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if s.is_empty() {
        return Err(ParseMoneyError::InvalidDigit {
            raw: raw.to_string(),
        });
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if frac_part.len() > 6 {
        return Err(ParseMoneyError::TooManyDecimals {
            raw: raw.to_string(),
        });
    }
    let digits_ok =
        |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !digits_ok(int_part) || (!frac_part.is_empty() && !digits_ok(frac_part)) {
        // allow ".5" / "5." shapes to fail explicitly rather than guess
        return Err(ParseMoneyError::InvalidDigit {
            raw: raw.to_string(),
        });
    }

    let whole: i64 = int_part.parse().map_err(|_| ParseMoneyError::Overflow {
        raw: raw.to_string(),
    })?;
    let mut frac: i64 = 0;
    if !frac_part.is_empty() {
        frac = frac_part.parse().map_err(|_| ParseMoneyError::Overflow {
            raw: raw.to_string(),
        })?;
        for _ in 0..(6 - frac_part.len()) {
            frac *= 10;
        }
    }

    let magnitude = (whole as i128) * (MICROS_SCALE as i128) + frac as i128;
    let signed = if negative { -magnitude } else { magnitude };
    if signed > i64::MAX as i128 || signed < i64::MIN as i128 {
        return Err(ParseMoneyError::Overflow {
            raw: raw.to_string(),
        });
    }
    Ok(Micros(signed as i64))
}

// ---------------------------------------------------------------------------
// Serde: decimal strings on the wire, never floats
// ---------------------------------------------------------------------------

impl Serialize for Micros {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MicrosVisitor;

        impl<'de> Visitor<'de> for MicrosVisitor {
            type Value = Micros;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a decimal money string or whole-dollar integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Micros, E> {
                parse_micros(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Micros, E> {
                Ok(Micros::from_dollars(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Micros, E> {
                if v > i64::MAX as u64 {
                    return Err(E::custom("money value overflows"));
                }
                Ok(Micros::from_dollars(v as i64))
            }
        }

        deserializer.deserialize_any(MicrosVisitor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
