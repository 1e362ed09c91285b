// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token usage types shared by the pricing model and the usage accumulator.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::TallyError;

/// Unique identifier for one accumulated run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a fresh random run identifier (UUID v4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token counts for one reporting unit (a single call or one step of a run).
///
/// `input_tokens` includes the cached portion. The invariant
/// `cached_input_tokens <= input_tokens` is checked by [`TokenUsage::new`] and
/// again by the pricing model, so a value built field-by-field (or
/// deserialized) cannot be priced while violating it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Total input tokens, cached and uncached.
    pub input_tokens: u64,
    /// Input tokens billed at the cached rate.
    pub cached_input_tokens: u64,
    /// Generated output tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Build a usage record, rejecting a cached count above the input count.
    pub fn new(
        input_tokens: u64,
        cached_input_tokens: u64,
        output_tokens: u64,
    ) -> Result<Self, TallyError> {
        let usage = Self {
            input_tokens,
            cached_input_tokens,
            output_tokens,
        };
        usage.validate()?;
        Ok(usage)
    }

    /// Check the cached/input invariant.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.cached_input_tokens > self.input_tokens {
            return Err(TallyError::invalid_usage(format!(
                "cached_input_tokens ({}) exceeds input_tokens ({})",
                self.cached_input_tokens, self.input_tokens
            )));
        }
        Ok(())
    }

    /// Input tokens billed at the full rate.
    ///
    /// Saturates at zero for a record that violates the invariant; callers
    /// that price tokens call [`TokenUsage::validate`] first.
    pub fn uncached_input_tokens(&self) -> u64 {
        self.input_tokens.saturating_sub(self.cached_input_tokens)
    }

    /// Field-wise sum, or `None` if any count overflows.
    pub fn checked_add(&self, other: &TokenUsage) -> Option<TokenUsage> {
        Some(TokenUsage {
            input_tokens: self.input_tokens.checked_add(other.input_tokens)?,
            cached_input_tokens: self
                .cached_input_tokens
                .checked_add(other.cached_input_tokens)?,
            output_tokens: self.output_tokens.checked_add(other.output_tokens)?,
        })
    }
}

/// How to treat a usage report that carries no cached-token count at all.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnreportedCachePolicy {
    /// Refuse to price the report.
    #[default]
    Reject,
    /// Assume no input tokens were served from cache, and log that assumption.
    Zero,
}

/// Breakdown of input tokens as some providers report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTokenDetails {
    /// Tokens read from the provider's prompt cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<i64>,
    /// Tokens written to the provider's prompt cache. Not priced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<i64>,
}

/// A usage report as an upstream collaborator emits it, before validation.
///
/// Every count is optional and signed because the upstream source may omit
/// fields or send garbage; [`UsageReport::resolve`] turns it into a
/// [`TokenUsage`] or an error. The cached count may arrive either flat or
/// nested under `inputTokenDetails`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    #[serde(default, alias = "promptTokens", alias = "input_tokens")]
    pub input_tokens: Option<i64>,

    #[serde(default, alias = "completionTokens", alias = "output_tokens")]
    pub output_tokens: Option<i64>,

    #[serde(
        default,
        alias = "cacheReadTokens",
        alias = "cached_input_tokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub cached_input_tokens: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_details: Option<InputTokenDetails>,
}

impl UsageReport {
    /// The reported cached count from whichever location carries it.
    ///
    /// Fails when both locations are present and disagree.
    pub fn cached_count(&self) -> Result<Option<i64>, TallyError> {
        let nested = self
            .input_token_details
            .as_ref()
            .and_then(|d| d.cache_read_tokens);
        match (self.cached_input_tokens, nested) {
            (Some(flat), Some(nested)) if flat != nested => Err(TallyError::invalid_usage(
                format!(
                    "conflicting cached token counts: cachedInputTokens={flat}, \
                     inputTokenDetails.cacheReadTokens={nested}"
                ),
            )),
            (flat, nested) => Ok(flat.or(nested)),
        }
    }

    /// Validate the report and convert it into a [`TokenUsage`].
    pub fn resolve(&self, policy: UnreportedCachePolicy) -> Result<TokenUsage, TallyError> {
        let input = required_count("inputTokens", self.input_tokens)?;
        let output = required_count("outputTokens", self.output_tokens)?;

        let cached = match self.cached_count()? {
            Some(value) => non_negative("cachedInputTokens", value)?,
            None => match policy {
                UnreportedCachePolicy::Reject => {
                    return Err(TallyError::invalid_usage(
                        "cached token count was not reported; \
                         set cost.unreported_cache = \"zero\" to treat it as 0",
                    ));
                }
                UnreportedCachePolicy::Zero => {
                    warn!(
                        input_tokens = input,
                        "cached token count not reported, assuming 0 cached tokens"
                    );
                    0
                }
            },
        };

        TokenUsage::new(input, cached, output)
    }
}

fn required_count(field: &str, value: Option<i64>) -> Result<u64, TallyError> {
    match value {
        Some(v) => non_negative(field, v),
        None => Err(TallyError::invalid_usage(format!("{field} was not reported"))),
    }
}

fn non_negative(field: &str, value: i64) -> Result<u64, TallyError> {
    u64::try_from(value)
        .map_err(|_| TallyError::invalid_usage(format!("{field} must be non-negative, got {value}")))
}
