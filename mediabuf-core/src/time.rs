//! Rational media timestamps
//!
//! Coded frames carry timestamps in their container's native timescale
//! (1/90000 for MPEG-TS, 1001/30000 frame durations, ...). Converting those
//! to floating point seconds loses the exactness the buffering algorithms rely
//! on when comparing adjacent frames, so [`MediaTime`] keeps a rational
//! `value / timescale` pair and only falls back to nanosecond precision when
//! an exact result no longer fits.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::time::Duration;

/// Timescale used when converting from floating point seconds
pub const DEFAULT_TIMESCALE: u32 = 1_000_000;

/// Timescale used when an exact result would not fit in 32 bits
const FALLBACK_TIMESCALE: u32 = 1_000_000_000;

#[derive(Clone, Copy)]
enum Repr {
    NegativeInfinite,
    Finite { value: i64, timescale: u32 },
    PositiveInfinite,
}

/// A point on the media timeline
///
/// Equality and ordering are numeric: `1/2` and `3/6` are the same time.
/// Unset timestamps are expressed as `Option<MediaTime>` by callers.
#[derive(Clone, Copy)]
pub struct MediaTime(Repr);

impl MediaTime {
    /// Time zero
    pub const ZERO: MediaTime = MediaTime(Repr::Finite {
        value: 0,
        timescale: 1,
    });

    /// Exactly one microsecond
    pub const MICROSECOND: MediaTime = MediaTime(Repr::Finite {
        value: 1,
        timescale: 1_000_000,
    });

    /// Positive infinity, later than every finite time
    pub const POSITIVE_INFINITY: MediaTime = MediaTime(Repr::PositiveInfinite);

    /// Negative infinity, earlier than every finite time
    pub const NEGATIVE_INFINITY: MediaTime = MediaTime(Repr::NegativeInfinite);

    /// Create a time of `value / timescale` seconds
    ///
    /// # Panics
    ///
    /// Panics if `timescale` is zero.
    pub fn new(value: i64, timescale: u32) -> Self {
        assert!(timescale > 0, "MediaTime timescale must be non-zero");
        Self(Repr::Finite { value, timescale })
    }

    /// Whole seconds
    pub fn from_secs(secs: i64) -> Self {
        Self::new(secs, 1)
    }

    /// Milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self::new(millis, 1_000)
    }

    /// Microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self::new(micros, 1_000_000)
    }

    /// Convert floating point seconds, rounding to the nearest microsecond
    ///
    /// Infinite inputs map to the matching infinity; NaN maps to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() {
            return Self::ZERO;
        }
        if secs == f64::INFINITY {
            return Self::POSITIVE_INFINITY;
        }
        if secs == f64::NEG_INFINITY {
            return Self::NEGATIVE_INFINITY;
        }

        let scaled = (secs * DEFAULT_TIMESCALE as f64).round();
        if scaled >= i64::MAX as f64 {
            Self::POSITIVE_INFINITY
        } else if scaled <= i64::MIN as f64 {
            Self::NEGATIVE_INFINITY
        } else {
            Self::new(scaled as i64, DEFAULT_TIMESCALE)
        }
    }

    /// Seconds as floating point (infinities map to `f64` infinities)
    pub fn as_secs_f64(&self) -> f64 {
        match self.0 {
            Repr::NegativeInfinite => f64::NEG_INFINITY,
            Repr::PositiveInfinite => f64::INFINITY,
            Repr::Finite { value, timescale } => value as f64 / timescale as f64,
        }
    }

    /// Whether this is a finite time
    pub fn is_finite(&self) -> bool {
        matches!(self.0, Repr::Finite { .. })
    }

    /// Whether this is positive infinity
    pub fn is_positive_infinite(&self) -> bool {
        matches!(self.0, Repr::PositiveInfinite)
    }

    /// Whether this is negative infinity
    pub fn is_negative_infinite(&self) -> bool {
        matches!(self.0, Repr::NegativeInfinite)
    }

    /// Whether this is strictly before zero
    pub fn is_negative(&self) -> bool {
        *self < Self::ZERO
    }

    /// Numerator and timescale of a finite time
    pub fn as_ratio(&self) -> Option<(i64, u32)> {
        match self.0 {
            Repr::Finite { value, timescale } => Some((value, timescale)),
            _ => None,
        }
    }

    /// Absolute value
    pub fn abs(self) -> Self {
        if self < Self::ZERO {
            -self
        } else {
            self
        }
    }

    fn from_ratio(numerator: i128, denominator: i128) -> Self {
        debug_assert!(denominator > 0);
        let divisor = gcd(numerator.unsigned_abs(), denominator as u128).max(1) as i128;
        let (numerator, denominator) = (numerator / divisor, denominator / divisor);

        if denominator <= u32::MAX as i128
            && numerator >= i64::MIN as i128
            && numerator <= i64::MAX as i128
        {
            return Self::new(numerator as i64, denominator as u32);
        }

        // Round to the nearest nanosecond.
        let scaled = numerator.saturating_mul(FALLBACK_TIMESCALE as i128);
        let half = denominator / 2;
        let rounded = if scaled >= 0 {
            scaled.saturating_add(half) / denominator
        } else {
            scaled.saturating_sub(half) / denominator
        };

        if rounded > i64::MAX as i128 {
            Self::POSITIVE_INFINITY
        } else if rounded < i64::MIN as i128 {
            Self::NEGATIVE_INFINITY
        } else {
            Self::new(rounded as i64, FALLBACK_TIMESCALE)
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        use Repr::*;
        match (self.0, other.0) {
            (NegativeInfinite, NegativeInfinite) | (PositiveInfinite, PositiveInfinite) => {
                Ordering::Equal
            }
            (NegativeInfinite, _) | (_, PositiveInfinite) => Ordering::Less,
            (PositiveInfinite, _) | (_, NegativeInfinite) => Ordering::Greater,
            (
                Finite {
                    value: a,
                    timescale: a_scale,
                },
                Finite {
                    value: b,
                    timescale: b_scale,
                },
            ) => {
                if a_scale == b_scale {
                    a.cmp(&b)
                } else {
                    (a as i128 * b_scale as i128).cmp(&(b as i128 * a_scale as i128))
                }
            }
        }
    }
}

impl Hash for MediaTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.0 {
            Repr::NegativeInfinite => state.write_u8(0),
            Repr::PositiveInfinite => state.write_u8(2),
            Repr::Finite { value, timescale } => {
                let divisor = gcd(value.unsigned_abs() as u128, timescale as u128).max(1) as i128;
                state.write_u8(1);
                state.write_i128(value as i128 / divisor);
                state.write_i128(timescale as i128 / divisor);
            }
        }
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: MediaTime) -> MediaTime {
        match (self.0, rhs.0) {
            (
                Repr::Finite {
                    value: a,
                    timescale: a_scale,
                },
                Repr::Finite {
                    value: b,
                    timescale: b_scale,
                },
            ) => {
                if a_scale == b_scale {
                    if let Some(sum) = a.checked_add(b) {
                        return MediaTime::new(sum, a_scale);
                    }
                }
                MediaTime::from_ratio(
                    a as i128 * b_scale as i128 + b as i128 * a_scale as i128,
                    a_scale as i128 * b_scale as i128,
                )
            }
            // An infinite left operand wins, including inf + -inf.
            (Repr::PositiveInfinite, _) | (Repr::NegativeInfinite, _) => self,
            (_, _) => rhs,
        }
    }
}

impl Neg for MediaTime {
    type Output = MediaTime;

    fn neg(self) -> MediaTime {
        match self.0 {
            Repr::NegativeInfinite => MediaTime::POSITIVE_INFINITY,
            Repr::PositiveInfinite => MediaTime::NEGATIVE_INFINITY,
            Repr::Finite { value, timescale } => match value.checked_neg() {
                Some(negated) => MediaTime::new(negated, timescale),
                None => MediaTime::from_ratio(-(value as i128), timescale as i128),
            },
        }
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    fn sub(self, rhs: MediaTime) -> MediaTime {
        self + (-rhs)
    }
}

impl AddAssign for MediaTime {
    fn add_assign(&mut self, rhs: MediaTime) {
        *self = *self + rhs;
    }
}

impl SubAssign for MediaTime {
    fn sub_assign(&mut self, rhs: MediaTime) {
        *self = *self - rhs;
    }
}

impl Mul<i64> for MediaTime {
    type Output = MediaTime;

    fn mul(self, rhs: i64) -> MediaTime {
        match self.0 {
            Repr::Finite { value, timescale } => {
                MediaTime::from_ratio(value as i128 * rhs as i128, timescale as i128)
            }
            _ if rhs == 0 => MediaTime::ZERO,
            _ if rhs < 0 => -self,
            _ => self,
        }
    }
}

impl From<Duration> for MediaTime {
    fn from(duration: Duration) -> Self {
        MediaTime::from_ratio(duration.as_nanos() as i128, FALLBACK_TIMESCALE as i128)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::NegativeInfinite => write!(f, "-inf"),
            Repr::PositiveInfinite => write!(f, "+inf"),
            Repr::Finite { .. } => write!(f, "{:.6}", self.as_secs_f64()),
        }
    }
}

impl fmt::Debug for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Finite { value, timescale } => {
                write!(f, "MediaTime({}/{} = {:.6}s)", value, timescale, self.as_secs_f64())
            }
            _ => write!(f, "MediaTime({})", self),
        }
    }
}

impl Serialize for MediaTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for MediaTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(MediaTime::from_secs_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_equality() {
        assert_eq!(MediaTime::new(1, 2), MediaTime::new(3, 6));
        assert_eq!(MediaTime::from_millis(1500), MediaTime::new(3, 2));
        assert_ne!(MediaTime::new(1, 3), MediaTime::from_secs_f64(0.333333));
    }

    #[test]
    fn test_ordering_with_infinities() {
        let one = MediaTime::from_secs(1);
        assert!(MediaTime::NEGATIVE_INFINITY < MediaTime::ZERO);
        assert!(one < MediaTime::POSITIVE_INFINITY);
        assert!(MediaTime::new(1001, 30000) < MediaTime::new(1, 29));
        assert_eq!(
            MediaTime::POSITIVE_INFINITY.cmp(&MediaTime::POSITIVE_INFINITY),
            Ordering::Equal
        );
    }

    #[test]
    fn test_microsecond_padding_is_exact() {
        let end = MediaTime::from_secs(1) + MediaTime::MICROSECOND;
        assert_eq!(end, MediaTime::from_micros(1_000_001));
        assert_eq!(end.as_secs_f64(), 1.000001);
    }

    #[test]
    fn test_mixed_timescale_arithmetic() {
        let ntsc_frame = MediaTime::new(1001, 30000);
        let three_frames = ntsc_frame * 3;
        assert_eq!(three_frames, MediaTime::new(3003, 30000));
        assert_eq!(three_frames - ntsc_frame, ntsc_frame * 2);

        let mixed = MediaTime::new(1, 90000) + MediaTime::new(1, 48000);
        assert_eq!(mixed, MediaTime::new(138, 4_320_000));
    }

    #[test]
    fn test_infinite_arithmetic() {
        let t = MediaTime::from_secs(5);
        assert_eq!(MediaTime::POSITIVE_INFINITY - t, MediaTime::POSITIVE_INFINITY);
        assert_eq!(t - MediaTime::NEGATIVE_INFINITY, MediaTime::POSITIVE_INFINITY);
        assert_eq!(
            (MediaTime::ZERO - MediaTime::POSITIVE_INFINITY).abs(),
            MediaTime::POSITIVE_INFINITY
        );
        assert_eq!(MediaTime::POSITIVE_INFINITY * 0, MediaTime::ZERO);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(MediaTime::from_secs_f64(f64::NAN), MediaTime::ZERO);
        assert!(MediaTime::from_secs_f64(f64::INFINITY).is_positive_infinite());
        assert_eq!(MediaTime::from_secs_f64(2.5), MediaTime::new(5, 2));
        assert_eq!(MediaTime::from(Duration::from_millis(250)), MediaTime::new(1, 4));
    }

    #[test]
    fn test_hash_matches_equality() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(MediaTime::new(1, 2));
        assert!(set.contains(&MediaTime::new(500, 1000)));
    }
}
