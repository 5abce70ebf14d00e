use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Fraction of the tick period after which a silent peer counts as gone.
const LIVENESS_FACTOR: f64 = 0.8;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub width: i32,
    pub height: i32,
    pub food_static: i32,
    pub state_delay_ms: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 25,
            height: 25,
            food_static: 10,
            state_delay_ms: 180,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBounds {
    pub width: RangeInclusive<i32>,
    pub height: RangeInclusive<i32>,
    pub food_static: RangeInclusive<i32>,
    pub state_delay_ms: RangeInclusive<i32>,
}

impl Default for ConfigBounds {
    fn default() -> Self {
        Self {
            width: 10..=100,
            height: 10..=100,
            food_static: 0..=100,
            state_delay_ms: 100..=3000,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
}

fn check(field: &'static str, value: i32, range: &RangeInclusive<i32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_within(&ConfigBounds::default())
    }

    pub fn validate_within(&self, bounds: &ConfigBounds) -> Result<(), ConfigError> {
        check("width", self.width, &bounds.width)?;
        check("height", self.height, &bounds.height)?;
        check("food_static", self.food_static, &bounds.food_static)?;
        check("state_delay_ms", self.state_delay_ms, &bounds.state_delay_ms)?;
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.state_delay_ms.max(1) as u64)
    }

    /// Period of the resend and ping tasks, also the resend age threshold.
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis((self.state_delay_ms / 10).max(1) as u64)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.state_delay_ms.max(1) as f64 * LIVENESS_FACTOR / 1000.0)
    }
}
