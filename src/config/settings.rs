use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_MIN_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 800;

/// Runtime-adjustable knobs for the request simulation: the latency window,
/// the injected-failure probability, and verbose per-request tracing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Probability in `[0, 1]` that a request short-circuits with a 500.
    pub error_rate: f64,
    pub logging: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            error_rate: 0.0,
            logging: false,
        }
    }
}

impl SimulationSettings {
    /// Settings with no latency and no injected failures. Used by tests and
    /// anywhere the simulation theater is unwanted.
    pub fn instant() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            error_rate: 0.0,
            logging: false,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let min_delay_ms = env::var("MOCKBANK_MIN_DELAY_MS")
            .unwrap_or_else(|_| DEFAULT_MIN_DELAY_MS.to_string())
            .parse::<u64>()
            .map_err(|_| {
                AppError::Configuration("MOCKBANK_MIN_DELAY_MS must be a valid number".to_string())
            })?;

        let max_delay_ms = env::var("MOCKBANK_MAX_DELAY_MS")
            .unwrap_or_else(|_| DEFAULT_MAX_DELAY_MS.to_string())
            .parse::<u64>()
            .map_err(|_| {
                AppError::Configuration("MOCKBANK_MAX_DELAY_MS must be a valid number".to_string())
            })?;

        let error_rate = env::var("MOCKBANK_ERROR_RATE")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<f64>()
            .map_err(|_| {
                AppError::Configuration("MOCKBANK_ERROR_RATE must be a valid number".to_string())
            })?;

        let logging = env::var("MOCKBANK_LOGGING")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|_| {
                AppError::Configuration("MOCKBANK_LOGGING must be true or false".to_string())
            })?;

        let settings = Self {
            min_delay_ms,
            max_delay_ms,
            error_rate,
            logging,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(AppError::Configuration(format!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(AppError::Configuration(format!(
                "error_rate ({}) must be within [0, 1]",
                self.error_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SimulationSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.min_delay_ms, 200);
        assert_eq!(settings.max_delay_ms, 800);
        assert_eq!(settings.error_rate, 0.0);
        assert!(!settings.logging);
    }

    #[test]
    fn rejects_inverted_delay_window() {
        let settings = SimulationSettings {
            min_delay_ms: 900,
            max_delay_ms: 100,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_error_rate() {
        let settings = SimulationSettings {
            error_rate: 1.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
