// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokentally_core::UnreportedCachePolicy;

/// Model identifier of the tier compiled into the defaults.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Top-level tokentally configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Cost accounting policy.
    #[serde(default)]
    pub cost: CostConfig,

    /// Pricing tiers keyed by model identifier.
    #[serde(default = "default_pricing")]
    pub pricing: BTreeMap<String, PricingTierConfig>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            cost: CostConfig::default(),
            pricing: default_pricing(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Cost accounting policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    /// What to do with a usage report that omits its cached-token count.
    #[serde(default)]
    pub unreported_cache: UnreportedCachePolicy,
}

/// Per-model rates in USD per million tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingTierConfig {
    /// Rate for input tokens not served from cache.
    pub uncached_input_per_mtok: Decimal,
    /// Rate for input tokens served from cache.
    pub cached_input_per_mtok: Decimal,
    /// Rate for generated output tokens.
    pub output_per_mtok: Decimal,
}

/// Tiers compiled into the binary.
///
/// Gemini 3 Flash Preview: input=$0.50/MTok, cached input=$0.05/MTok (10% of
/// input), output=$3.00/MTok.
pub fn default_pricing() -> BTreeMap<String, PricingTierConfig> {
    let mut pricing = BTreeMap::new();
    pricing.insert(
        DEFAULT_MODEL.to_string(),
        PricingTierConfig {
            uncached_input_per_mtok: Decimal::new(50, 2),
            cached_input_per_mtok: Decimal::new(5, 2),
            output_per_mtok: Decimal::new(300, 2),
        },
    );
    pricing
}
