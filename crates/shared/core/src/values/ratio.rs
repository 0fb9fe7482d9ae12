use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Frequency, Ticks};

/// Conversion factor from clock-source ticks to entry-domain ticks
///
/// Stored as a reduced fraction so that scaling never goes through floating
/// point. A device running at 1 MHz on a 4 MHz source has a ratio of 1/4: it
/// sees one tick for every four source ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ratio {
    numerator: u64,
    denominator: u64,
}

impl Ratio {
    /// Identity ratio (entry runs at the source frequency)
    pub const ONE: Ratio = Ratio {
        numerator: 1,
        denominator: 1,
    };

    /// Build a reduced ratio. Returns `None` if either term is zero.
    pub fn new(numerator: u64, denominator: u64) -> Option<Self> {
        if numerator == 0 || denominator == 0 {
            return None;
        }
        let divisor = gcd(numerator, denominator);
        Some(Self {
            numerator: numerator / divisor,
            denominator: denominator / divisor,
        })
    }

    /// Ratio for a device ticking at `owner_hz` driven by a source ticking at `source_hz`
    pub fn from_frequencies(owner_hz: Frequency, source_hz: Frequency) -> Option<Self> {
        Self::new(owner_hz, source_hz)
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    pub fn is_integral(&self) -> bool {
        self.denominator == 1
    }

    /// Scale `ticks` into the entry domain.
    ///
    /// `carry` is the fractional remainder left over by the previous call (in
    /// units of `1/denominator`). Returns the whole entry ticks and the new
    /// remainder. The result is always truncated, so an entry never observes
    /// a tick before the source has fully produced it.
    pub fn scale(&self, ticks: Ticks, carry: u64) -> (Ticks, u64) {
        let total = ticks as u128 * self.numerator as u128 + carry as u128;
        let denominator = self.denominator as u128;
        let whole = total / denominator;
        let remainder = (total % denominator) as u64;
        (u64::try_from(whole).unwrap_or(u64::MAX), remainder)
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_is_reduced() {
        let ratio = Ratio::new(1_000_000, 4_000_000).unwrap();
        assert_eq!(ratio.numerator(), 1);
        assert_eq!(ratio.denominator(), 4);
        assert_eq!(ratio.to_string(), "1/4");
    }

    #[test]
    fn test_zero_terms_rejected() {
        assert!(Ratio::new(0, 5).is_none());
        assert!(Ratio::from_frequencies(1_000, 0).is_none());
    }

    #[test]
    fn test_integral_scale_has_no_carry() {
        let ratio = Ratio::new(3, 1).unwrap();
        assert!(ratio.is_integral());
        assert_eq!(ratio.scale(7, 0), (21, 0));
    }

    #[test]
    fn test_fractional_scale_carries_remainder() {
        let ratio = Ratio::from_frequencies(1, 3).unwrap();

        let (ticks, carry) = ratio.scale(1, 0);
        assert_eq!((ticks, carry), (0, 1));
        let (ticks, carry) = ratio.scale(1, carry);
        assert_eq!((ticks, carry), (0, 2));
        let (ticks, carry) = ratio.scale(1, carry);
        assert_eq!((ticks, carry), (1, 0));
    }

    #[test]
    fn test_scale_truncates_instead_of_rounding() {
        let ratio = Ratio::new(2, 3).unwrap();
        // 5 * 2/3 = 3.33..
        assert_eq!(ratio.scale(5, 0), (3, 1));
    }

    #[test]
    fn test_scale_saturates_on_overflow() {
        let ratio = Ratio::new(u64::MAX, 1).unwrap();
        assert_eq!(ratio.scale(u64::MAX, 0).0, u64::MAX);
    }
}
