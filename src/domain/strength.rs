//! Displacement strength
//!
//! Strength scales map-driven offsets linearly: at 100 a fully saturated
//! channel moves a sample by roughly 100 pixels.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lowest accepted strength
pub const MIN_STRENGTH: f64 = 0.0;

/// Highest accepted strength
pub const MAX_STRENGTH: f64 = 100.0;

/// Strength used when the host does not provide one
pub const DEFAULT_STRENGTH: f64 = 50.0;

/// Strength value clamped to [0, 100] on every write
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct DisplacementStrength(f64);

impl DisplacementStrength {
    /// Clamp `amount` into range; non-finite input collapses to the nearest bound
    /// (NaN becomes zero)
    pub fn new(amount: f64) -> Self {
        if amount.is_nan() {
            warn!("Displacement strength is NaN, using {}", MIN_STRENGTH);
            return DisplacementStrength(MIN_STRENGTH);
        }
        if amount.is_infinite() {
            warn!(amount = amount, "Displacement strength is infinite, clamping");
        }
        DisplacementStrength(amount.clamp(MIN_STRENGTH, MAX_STRENGTH))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Offset in pixels produced by a single map channel value
    ///
    /// 128 is neutral; the result is not rounded.
    #[inline]
    pub fn offset_for(self, channel: u8) -> f64 {
        (channel as f64 - 128.0) * self.0 / 128.0
    }
}

impl Default for DisplacementStrength {
    fn default() -> Self {
        DisplacementStrength(DEFAULT_STRENGTH)
    }
}

impl From<f64> for DisplacementStrength {
    fn from(amount: f64) -> Self {
        DisplacementStrength::new(amount)
    }
}

impl From<DisplacementStrength> for f64 {
    fn from(strength: DisplacementStrength) -> Self {
        strength.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_below_zero() {
        assert_eq!(DisplacementStrength::new(-5.0).value(), 0.0);
    }

    #[test]
    fn test_clamps_above_hundred() {
        assert_eq!(DisplacementStrength::new(150.0).value(), 100.0);
    }

    #[test]
    fn test_non_finite_input() {
        assert_eq!(DisplacementStrength::new(f64::NAN).value(), 0.0);
        assert_eq!(DisplacementStrength::new(f64::INFINITY).value(), 100.0);
    }

    #[test]
    fn test_offset_centered_on_128() {
        let strength = DisplacementStrength::new(100.0);
        assert_eq!(strength.offset_for(128), 0.0);
        assert_eq!(strength.offset_for(0), -100.0);
        assert!((strength.offset_for(255) - 99.21875).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_clamps() {
        #[derive(Deserialize)]
        struct Wrapper {
            strength: DisplacementStrength,
        }
        let parsed: Wrapper = config::Config::builder()
            .set_override("strength", 400.0)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(parsed.strength.value(), 100.0);
    }
}
