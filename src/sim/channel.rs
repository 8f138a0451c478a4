//! Ideal radio channel model.

use std::time::Duration;

use crate::core::{DEFAULT_BITRATE, SPEED_OF_LIGHT};
use crate::frame::airtime;
use crate::telemetry::Position;

use super::error::SimError;

/// Channel parameters and fault injection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Bits per second.
    pub bitrate: u64,
    /// Probability that a frame is lost before reaching its destination.
    pub drop_probability: f64,
    /// Seed for the drop decisions.
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bitrate: DEFAULT_BITRATE,
            drop_probability: 0.0,
            seed: 0,
        }
    }
}

impl ChannelConfig {
    /// Lossy channel with reproducible drops.
    pub fn lossy(drop_probability: f64, seed: u64) -> Self {
        Self {
            drop_probability,
            seed,
            ..Self::default()
        }
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.bitrate == 0 {
            return Err(SimError::ZeroBitrate);
        }
        if !(0.0..=1.0).contains(&self.drop_probability) {
            return Err(SimError::InvalidDropProbability(self.drop_probability));
        }
        Ok(())
    }

    /// Time a frame of `size_bits` occupies the air.
    pub fn airtime(&self, size_bits: u32) -> Duration {
        airtime(size_bits, self.bitrate)
    }
}

/// Signal travel time between two positions.
pub fn propagation_delay(from: &Position, to: &Position) -> Duration {
    Duration::from_secs_f64(from.distance_to(to) / SPEED_OF_LIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airtime() {
        let channel = ChannelConfig {
            bitrate: 1_000,
            ..ChannelConfig::default()
        };
        assert_eq!(channel.airtime(10), Duration::from_millis(10));
        assert_eq!(ChannelConfig::default().airtime(68), Duration::from_micros(10));
    }

    #[test]
    fn test_propagation_delay() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(299.792458, 0.0, 0.0);
        let delay = propagation_delay(&a, &b);
        assert!(delay.abs_diff(Duration::from_micros(1)) < Duration::from_nanos(1));
        assert_eq!(propagation_delay(&a, &a), Duration::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(ChannelConfig::default().validate().is_ok());
        assert_eq!(
            ChannelConfig::lossy(1.5, 0).validate(),
            Err(SimError::InvalidDropProbability(1.5))
        );
        let zero = ChannelConfig {
            bitrate: 0,
            ..ChannelConfig::default()
        };
        assert_eq!(zero.validate(), Err(SimError::ZeroBitrate));
    }
}
