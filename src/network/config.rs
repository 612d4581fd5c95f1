//! Network condition configuration.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors for invalid network conditions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("minimum delay {min:?} exceeds maximum delay {max:?}")]
    InvalidDelayRange { min: Duration, max: Duration },

    #[error("loss probability {0} is outside [0, 1]")]
    InvalidLossProbability(f64),
}

/// Delay and loss characteristics of a simulated link.
///
/// Durations are (de)serialized as whole milliseconds, and deserialization
/// runs [`validate`](Self::validate):
///
/// ```rust
/// use relay_fsm::network::NetworkConditions;
/// use std::time::Duration;
///
/// let conditions: NetworkConditions = serde_json::from_str(
///     r#"{ "min_delay": 100, "max_delay": 300, "loss_enabled": true, "loss_probability": 0.25 }"#,
/// ).unwrap();
/// conditions.validate().unwrap();
/// assert_eq!(conditions.max_delay, Duration::from_millis(300));
///
/// let inverted = serde_json::from_str::<NetworkConditions>(
///     r#"{ "min_delay": 300, "max_delay": 100, "loss_enabled": false, "loss_probability": 0.0 }"#,
/// );
/// assert!(inverted.is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedConditions")]
pub struct NetworkConditions {
    #[serde(with = "millis")]
    pub min_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub loss_enabled: bool,
    pub loss_probability: f64,
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(150),
            loss_enabled: false,
            loss_probability: 0.1,
        }
    }
}

impl NetworkConditions {
    pub fn builder() -> NetworkConditionsBuilder {
        NetworkConditionsBuilder::new()
    }

    /// Constant delay, no loss.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min_delay: delay,
            max_delay: delay,
            loss_enabled: false,
            ..Self::default()
        }
    }

    /// Check ranges. Conditions read from external configuration should be
    /// validated before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay > self.max_delay {
            return Err(ConfigError::InvalidDelayRange {
                min: self.min_delay,
                max: self.max_delay,
            });
        }
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(ConfigError::InvalidLossProbability(self.loss_probability));
        }
        Ok(())
    }

    /// Draw a delay uniformly from `[min_delay, max_delay]`.
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_delay >= self.max_delay {
            return self.min_delay;
        }
        let secs = rng.gen_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(self.min_delay, self.max_delay)
    }

    /// Draw whether a request is lost. Consumes randomness only when loss
    /// simulation is enabled.
    pub fn should_drop<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.loss_enabled && rng.gen::<f64>() < self.loss_probability
    }
}

/// Wire shape of [`NetworkConditions`] before validation.
#[derive(Deserialize)]
struct UncheckedConditions {
    #[serde(with = "millis")]
    min_delay: Duration,
    #[serde(with = "millis")]
    max_delay: Duration,
    loss_enabled: bool,
    loss_probability: f64,
}

impl TryFrom<UncheckedConditions> for NetworkConditions {
    type Error = ConfigError;

    fn try_from(raw: UncheckedConditions) -> Result<Self, Self::Error> {
        let conditions = Self {
            min_delay: raw.min_delay,
            max_delay: raw.max_delay,
            loss_enabled: raw.loss_enabled,
            loss_probability: raw.loss_probability,
        };
        conditions.validate()?;
        Ok(conditions)
    }
}

/// Validating builder for [`NetworkConditions`].
#[derive(Debug, Clone)]
pub struct NetworkConditionsBuilder {
    conditions: NetworkConditions,
}

impl NetworkConditionsBuilder {
    pub fn new() -> Self {
        Self {
            conditions: NetworkConditions::default(),
        }
    }

    /// Set the delay interval.
    pub fn delay(mut self, min: Duration, max: Duration) -> Self {
        self.conditions.min_delay = min;
        self.conditions.max_delay = max;
        self
    }

    /// Enable loss with the given probability.
    pub fn loss(mut self, probability: f64) -> Self {
        self.conditions.loss_enabled = true;
        self.conditions.loss_probability = probability;
        self
    }

    pub fn without_loss(mut self) -> Self {
        self.conditions.loss_enabled = false;
        self
    }

    pub fn build(self) -> Result<NetworkConditions, ConfigError> {
        self.conditions.validate()?;
        Ok(self.conditions)
    }
}

impl Default for NetworkConditionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn builder_rejects_inverted_range() {
        let result = NetworkConditions::builder()
            .delay(Duration::from_millis(200), Duration::from_millis(100))
            .build();

        assert!(matches!(result, Err(ConfigError::InvalidDelayRange { .. })));
    }

    #[test]
    fn builder_rejects_bad_probability() {
        let result = NetworkConditions::builder().loss(1.5).build();
        assert_eq!(result, Err(ConfigError::InvalidLossProbability(1.5)));
    }

    #[test]
    fn fixed_delay_always_samples_same_value() {
        let conditions = NetworkConditions::fixed(Duration::from_millis(100));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..20 {
            assert_eq!(conditions.sample_delay(&mut rng), Duration::from_millis(100));
        }
    }

    #[test]
    fn sampled_delay_stays_in_range() {
        let conditions = NetworkConditions::builder()
            .delay(Duration::from_millis(10), Duration::from_millis(40))
            .build()
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..200 {
            let delay = conditions.sample_delay(&mut rng);
            assert!(delay >= conditions.min_delay && delay <= conditions.max_delay);
        }
    }

    #[test]
    fn loss_disabled_never_drops() {
        let conditions = NetworkConditions {
            loss_enabled: false,
            loss_probability: 1.0,
            ..NetworkConditions::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!((0..100).all(|_| !conditions.should_drop(&mut rng)));
    }

    #[test]
    fn certain_loss_always_drops() {
        let conditions = NetworkConditions::builder().loss(1.0).build().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!((0..100).all(|_| conditions.should_drop(&mut rng)));
    }

    #[test]
    fn conditions_round_trip_as_millis() {
        let conditions = NetworkConditions::fixed(Duration::from_millis(75));
        let json = serde_json::to_string(&conditions).unwrap();
        assert!(json.contains("\"min_delay\":75"));

        let back: NetworkConditions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conditions);
    }

    #[test]
    fn deserialization_rejects_invalid_conditions() {
        let bad_probability = serde_json::from_str::<NetworkConditions>(
            r#"{ "min_delay": 10, "max_delay": 20,
                "loss_enabled": true, "loss_probability": 7.5 }"#,
        );
        assert!(bad_probability.is_err());

        let inverted = serde_json::from_str::<NetworkConditions>(
            r#"{ "min_delay": 500, "max_delay": 20,
                "loss_enabled": false, "loss_probability": 0.1 }"#,
        );
        assert!(inverted.is_err());
    }
}
