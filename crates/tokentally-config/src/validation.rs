// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive rates and non-empty model identifiers.

use rust_decimal::Decimal;
use tracing::warn;

use crate::diagnostic::ConfigError;
use crate::model::TallyConfig;

/// A configuration value that is accepted but probably not what the user meant.
///
/// Returned rather than logged so the caller can report it once its
/// subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A tier charges more for cached input than for uncached input.
    CachedRateAboveUncached {
        model: String,
        cached_input_per_mtok: Decimal,
        uncached_input_per_mtok: Decimal,
    },
}

impl ConfigWarning {
    /// Emit the warning as a structured `warn!` event.
    pub fn log(&self) {
        match self {
            Self::CachedRateAboveUncached {
                model,
                cached_input_per_mtok,
                uncached_input_per_mtok,
            } => warn!(
                model = %model,
                cached_input_per_mtok = %cached_input_per_mtok,
                uncached_input_per_mtok = %uncached_input_per_mtok,
                "cached input rate exceeds uncached input rate"
            ),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TallyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.log.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.pricing.is_empty() {
        errors.push(ConfigError::Validation {
            message: "at least one [pricing.\"<model>\"] tier must be configured".to_string(),
        });
    }

    for (model, tier) in &config.pricing {
        if model.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "pricing model identifiers must not be empty".to_string(),
            });
            continue;
        }
        if model.trim() != model {
            errors.push(ConfigError::Validation {
                message: format!(
                    "pricing model identifier `{model}` has leading or trailing whitespace"
                ),
            });
        }

        let rates = [
            ("uncached_input_per_mtok", tier.uncached_input_per_mtok),
            ("cached_input_per_mtok", tier.cached_input_per_mtok),
            ("output_per_mtok", tier.output_per_mtok),
        ];
        for (name, rate) in rates {
            if rate <= Decimal::ZERO {
                errors.push(ConfigError::Validation {
                    message: format!("pricing.\"{model}\".{name} must be positive, got {rate}"),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Collect the non-fatal findings for an already validated configuration.
pub fn config_warnings(config: &TallyConfig) -> Vec<ConfigWarning> {
    config
        .pricing
        .iter()
        .filter(|(_, tier)| tier.cached_input_per_mtok > tier.uncached_input_per_mtok)
        .map(|(model, tier)| ConfigWarning::CachedRateAboveUncached {
            model: model.clone(),
            cached_input_per_mtok: tier.cached_input_per_mtok,
            uncached_input_per_mtok: tier.uncached_input_per_mtok,
        })
        .collect()
}
