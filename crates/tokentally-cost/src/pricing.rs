// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pricing tiers and cost calculation.
//!
//! Rates are USD per million tokens. Input tokens are split into an uncached
//! part billed at the full input rate and a cached part billed at the cached
//! rate; a provider's cache read is typically 10% of the input price.
//! All arithmetic is exact decimal arithmetic.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokentally_config::{PricingTierConfig, TallyConfig};
use tokentally_core::{TallyError, TokenUsage};

/// Minimum Jaro-Winkler score for an unknown-model suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Per-model pricing in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    /// Cost per million input tokens not served from cache.
    pub uncached_input_per_mtok: Decimal,
    /// Cost per million input tokens served from cache.
    pub cached_input_per_mtok: Decimal,
    /// Cost per million output tokens.
    pub output_per_mtok: Decimal,
}

impl PricingTier {
    /// Price a usage record against this tier. See [`compute_cost`].
    pub fn cost(&self, usage: &TokenUsage) -> Result<CostBreakdown, TallyError> {
        compute_cost(usage, self)
    }

    /// What the usage would cost if every input token were billed uncached.
    pub fn undiscounted_cost(&self, usage: &TokenUsage) -> Result<Decimal, TallyError> {
        usage.validate()?;
        let input = per_million(usage.input_tokens, self.uncached_input_per_mtok)?;
        let output = per_million(usage.output_tokens, self.output_per_mtok)?;
        input.checked_add(output).ok_or_else(cost_overflow)
    }
}

impl From<&PricingTierConfig> for PricingTier {
    fn from(config: &PricingTierConfig) -> Self {
        Self {
            uncached_input_per_mtok: config.uncached_input_per_mtok,
            cached_input_per_mtok: config.cached_input_per_mtok,
            output_per_mtok: config.output_per_mtok,
        }
    }
}

/// Cost of one usage record, split by token class.
///
/// `total_cost` is always `uncached_cost + cached_cost + output_cost`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub uncached_cost: Decimal,
    pub cached_cost: Decimal,
    pub output_cost: Decimal,
    pub total_cost: Decimal,
}

impl CostBreakdown {
    /// Component-wise sum, or `None` on decimal overflow.
    pub fn checked_add(&self, other: &CostBreakdown) -> Option<CostBreakdown> {
        Some(CostBreakdown {
            uncached_cost: self.uncached_cost.checked_add(other.uncached_cost)?,
            cached_cost: self.cached_cost.checked_add(other.cached_cost)?,
            output_cost: self.output_cost.checked_add(other.output_cost)?,
            total_cost: self.total_cost.checked_add(other.total_cost)?,
        })
    }
}

/// Calculate the cost of `usage` under `tier`.
///
/// Formula: `(tokens / 1_000_000) * rate` for the uncached input, cached input,
/// and output token counts. Fails with [`TallyError::InvalidUsage`] when the
/// cached count exceeds the input count; the counts are never clamped.
pub fn compute_cost(usage: &TokenUsage, tier: &PricingTier) -> Result<CostBreakdown, TallyError> {
    usage.validate()?;

    let uncached_cost = per_million(usage.uncached_input_tokens(), tier.uncached_input_per_mtok)?;
    let cached_cost = per_million(usage.cached_input_tokens, tier.cached_input_per_mtok)?;
    let output_cost = per_million(usage.output_tokens, tier.output_per_mtok)?;
    let total_cost = uncached_cost
        .checked_add(cached_cost)
        .and_then(|sum| sum.checked_add(output_cost))
        .ok_or_else(cost_overflow)?;

    Ok(CostBreakdown {
        uncached_cost,
        cached_cost,
        output_cost,
        total_cost,
    })
}

fn per_million(tokens: u64, rate: Decimal) -> Result<Decimal, TallyError> {
    let millions = Decimal::from(tokens)
        .checked_div(Decimal::from(1_000_000u32))
        .ok_or_else(cost_overflow)?;
    millions.checked_mul(rate).ok_or_else(cost_overflow)
}

fn cost_overflow() -> TallyError {
    TallyError::invalid_usage("cost exceeds decimal range")
}

/// A successful tier lookup: the configured identifier and its tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTier<'a> {
    pub model: &'a str,
    pub tier: &'a PricingTier,
}

/// Immutable model-to-tier table, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    tiers: BTreeMap<String, PricingTier>,
}

impl PricingTable {
    /// Build the table from loaded configuration.
    ///
    /// Rejects tiers with non-positive rates even if the configuration was
    /// never passed through validation.
    pub fn from_config(config: &TallyConfig) -> Result<Self, TallyError> {
        let mut tiers = BTreeMap::new();
        for (model, tier_config) in &config.pricing {
            let tier = PricingTier::from(tier_config);
            let rates = [
                tier.uncached_input_per_mtok,
                tier.cached_input_per_mtok,
                tier.output_per_mtok,
            ];
            if rates.iter().any(|rate| *rate <= Decimal::ZERO) {
                return Err(TallyError::Config(format!(
                    "pricing tier `{model}` has a non-positive rate"
                )));
            }
            tiers.insert(model.clone(), tier);
        }
        Ok(Self { tiers })
    }

    /// Build a table directly from tiers.
    pub fn from_tiers<I, S>(tiers: I) -> Self
    where
        I: IntoIterator<Item = (S, PricingTier)>,
        S: Into<String>,
    {
        Self {
            tiers: tiers.into_iter().map(|(m, t)| (m.into(), t)).collect(),
        }
    }

    /// Resolve a model identifier to its configured key and tier.
    ///
    /// Tries the identifier as given, then with a `provider/` or `provider:`
    /// prefix removed. There is no default tier.
    pub fn lookup(&self, model: &str) -> Result<ResolvedTier<'_>, TallyError> {
        let candidates = std::iter::once(model).chain(strip_provider(model));
        for candidate in candidates {
            if let Some((key, tier)) = self.tiers.get_key_value(candidate) {
                return Ok(ResolvedTier {
                    model: key.as_str(),
                    tier,
                });
            }
        }

        Err(TallyError::UnknownModel {
            model: model.to_string(),
            suggestion: self.suggest(strip_provider(model).unwrap_or(model)),
        })
    }

    /// Configured model identifiers and tiers, in identifier order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &PricingTier)> {
        self.tiers.iter().map(|(m, t)| (m.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    fn suggest(&self, model: &str) -> Option<String> {
        let mut best_score = SUGGESTION_THRESHOLD;
        let mut best = None;
        for key in self.tiers.keys() {
            let score = strsim::jaro_winkler(model, key);
            if score > best_score {
                best_score = score;
                best = Some(key.clone());
            }
        }
        best
    }
}

fn strip_provider(model: &str) -> Option<&str> {
    model
        .split_once('/')
        .or_else(|| model.split_once(':'))
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
}
