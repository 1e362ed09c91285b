// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage-based cost accounting for LLM calls and multi-step runs.
//!
//! This crate provides:
//! - **Pricing**: per-model tiers with separate uncached, cached and output rates
//! - **Runs**: an `Open -> Sealed` accumulator that prices each step on its own
//! - **Reconciliation**: comparison of summed steps against a reported run total
//! - **Attributes**: `$0.000000` formatting and span attribute export

pub mod attributes;
pub mod pricing;
pub mod reconcile;
pub mod run;

pub use attributes::{format_usd, AttributeValue, SpanAttribute};
pub use pricing::{compute_cost, CostBreakdown, PricingTable, PricingTier, ResolvedTier};
pub use reconcile::{FieldDiscrepancy, UsageField, UsageReconciliationWarning};
pub use run::{Run, RunStatus, RunSummary, StepRecord, UsageAccumulator};
