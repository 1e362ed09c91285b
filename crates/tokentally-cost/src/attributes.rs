// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Money formatting and span attribute export.
//!
//! The caller owns whatever span or log record the attributes end up on;
//! nothing here looks up an ambient span.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::debug;

use crate::pricing::CostBreakdown;
use crate::run::{RunSummary, StepRecord};

/// Decimal places in formatted dollar amounts.
pub const USD_DECIMAL_PLACES: u32 = 6;

/// Format a dollar amount as `$0.001234`: six places, half away from zero.
pub fn format_usd(amount: Decimal) -> String {
    let mut rounded =
        amount.round_dp_with_strategy(USD_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(USD_DECIMAL_PLACES);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${}", rounded.abs())
    } else {
        format!("${}", rounded.abs())
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    F64(f64),
    I64(i64),
    Bool(bool),
    String(String),
}

/// A key/value pair ready to be set on a tracing or telemetry span.
///
/// Token counts are exported as `i64` and saturate at `i64::MAX`. Costs are
/// exported as `f64` next to an exact formatted `_usd` string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanAttribute {
    pub key: &'static str,
    pub value: AttributeValue,
}

impl SpanAttribute {
    fn f64(key: &'static str, amount: Decimal) -> Self {
        // Lossy by nature; the exact figure travels in the `_usd` string.
        let value = amount.to_f64().unwrap_or_else(|| {
            debug!(key, %amount, "cost not representable as f64");
            f64::NAN
        });
        Self {
            key,
            value: AttributeValue::F64(value),
        }
    }

    fn i64(key: &'static str, count: u64) -> Self {
        let value = i64::try_from(count).unwrap_or_else(|_| {
            debug!(key, count, "token count exceeds i64 range, capping");
            i64::MAX
        });
        Self {
            key,
            value: AttributeValue::I64(value),
        }
    }

    fn string(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: AttributeValue::String(value.into()),
        }
    }
}

impl CostBreakdown {
    /// `expected_cost` (f64), `expected_cost_usd` (formatted) and the
    /// per-class costs.
    pub fn span_attributes(&self) -> Vec<SpanAttribute> {
        vec![
            SpanAttribute::f64("expected_cost", self.total_cost),
            SpanAttribute::string("expected_cost_usd", format_usd(self.total_cost)),
            SpanAttribute::f64("expected_uncached_input_cost", self.uncached_cost),
            SpanAttribute::f64("expected_cached_input_cost", self.cached_cost),
            SpanAttribute::f64("expected_output_cost", self.output_cost),
        ]
    }
}

impl StepRecord {
    pub fn span_attributes(&self) -> Vec<SpanAttribute> {
        let mut attrs = vec![
            SpanAttribute::i64("step_index", self.index as u64),
            SpanAttribute::i64("input_tokens", self.usage.input_tokens),
            SpanAttribute::i64("cached_input_tokens", self.usage.cached_input_tokens),
            SpanAttribute::i64("output_tokens", self.usage.output_tokens),
        ];
        attrs.extend(self.cost.span_attributes());
        attrs
    }
}

impl RunSummary {
    /// Run-level attributes: identity, summed token counts, summed cost and
    /// whether the reported total matched.
    ///
    /// Counts above `i64::MAX` are capped; see [`SpanAttribute`].
    pub fn span_attributes(&self) -> Vec<SpanAttribute> {
        let mut attrs = vec![
            SpanAttribute::string("run_id", self.run_id.to_string()),
            SpanAttribute::string("model", self.model.clone()),
            SpanAttribute::i64("step_count", self.step_count() as u64),
            SpanAttribute::i64("input_tokens", self.total_usage.input_tokens),
            SpanAttribute::i64("cached_input_tokens", self.total_usage.cached_input_tokens),
            SpanAttribute::i64("output_tokens", self.total_usage.output_tokens),
        ];
        attrs.extend(self.total_cost.span_attributes());
        attrs.push(SpanAttribute::string(
            "cache_savings_usd",
            format_usd(self.cache_savings()),
        ));
        attrs.push(SpanAttribute {
            key: "usage_reconciled",
            value: AttributeValue::Bool(self.is_reconciled()),
        });
        attrs
    }
}
