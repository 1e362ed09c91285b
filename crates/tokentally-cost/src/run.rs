// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-step usage accumulation.
//!
//! A [`Run`] is one logical task that may span several sequential model
//! invocations (steps). Each step is priced on its own and appended in order;
//! sealing the run sums the steps and optionally compares the sum against an
//! independently reported run total. A run is `Open` until sealed and `Sealed`
//! afterwards; there is no way back.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokentally_core::{RunId, TallyError, TokenUsage};
use tracing::{debug, info, warn};

use crate::pricing::{compute_cost, CostBreakdown, PricingTable, PricingTier};
use crate::reconcile::UsageReconciliationWarning;

/// Creates runs against a shared, immutable pricing table.
#[derive(Debug, Clone)]
pub struct UsageAccumulator {
    table: Arc<PricingTable>,
}

impl UsageAccumulator {
    pub fn new(table: PricingTable) -> Self {
        Self::from_shared(Arc::new(table))
    }

    pub fn from_shared(table: Arc<PricingTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// Start a run for `model`.
    ///
    /// The tier is resolved here so an unknown model fails before any step is
    /// recorded.
    pub fn begin(&self, model: &str) -> Result<Run, TallyError> {
        let resolved = self.table.lookup(model)?;
        let run = Run {
            id: RunId::new(),
            model: resolved.model.to_string(),
            tier: *resolved.tier,
            steps: Vec::new(),
            undiscounted_cost: Decimal::ZERO,
            summary: None,
        };
        info!(run_id = %run.id, model = %run.model, requested = model, "run started");
        Ok(run)
    }
}

/// Lifecycle state of a [`Run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Open,
    Sealed,
}

/// One recorded step with its own cost and the running totals through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the run.
    pub index: usize,
    pub usage: TokenUsage,
    pub cost: CostBreakdown,
    pub cumulative_usage: TokenUsage,
    pub cumulative_cost: CostBreakdown,
}

/// Final totals of a sealed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub model: String,
    pub steps: Vec<StepRecord>,
    pub total_usage: TokenUsage,
    pub total_cost: CostBreakdown,
    /// What the run would have cost with no cache discount.
    pub undiscounted_cost: Decimal,
    /// The independently reported total the run was sealed against, if any.
    pub reported_total: Option<TokenUsage>,
    pub reconciliation: Option<UsageReconciliationWarning>,
}

impl RunSummary {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Dollars saved by cached input pricing across the run.
    pub fn cache_savings(&self) -> Decimal {
        self.undiscounted_cost - self.total_cost.total_cost
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciliation.is_none()
    }
}

/// A single task's usage, owned by whoever began it.
#[derive(Debug)]
pub struct Run {
    id: RunId,
    model: String,
    tier: PricingTier,
    steps: Vec<StepRecord>,
    undiscounted_cost: Decimal,
    summary: Option<RunSummary>,
}

impl Run {
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// The configured model identifier the run resolved to.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn status(&self) -> RunStatus {
        if self.summary.is_some() {
            RunStatus::Sealed
        } else {
            RunStatus::Open
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// The summary, once sealed.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Price `usage` and append it as the next step.
    ///
    /// On error the run is left exactly as it was.
    pub fn record_step(&mut self, usage: TokenUsage) -> Result<StepRecord, TallyError> {
        if self.summary.is_some() {
            return Err(self.state_error("record a step on"));
        }

        let cost = compute_cost(&usage, &self.tier)?;
        let undiscounted = self.tier.undiscounted_cost(&usage)?;

        let (prev_usage, prev_cost) = self
            .steps
            .last()
            .map(|s| (s.cumulative_usage, s.cumulative_cost))
            .unwrap_or_default();
        let cumulative_usage = prev_usage.checked_add(&usage).ok_or_else(|| {
            TallyError::invalid_usage("cumulative token count exceeds u64 range")
        })?;
        let cumulative_cost = prev_cost
            .checked_add(&cost)
            .ok_or_else(|| TallyError::invalid_usage("cumulative cost exceeds decimal range"))?;
        let undiscounted_cost = self
            .undiscounted_cost
            .checked_add(undiscounted)
            .ok_or_else(|| TallyError::invalid_usage("cumulative cost exceeds decimal range"))?;

        let record = StepRecord {
            index: self.steps.len() + 1,
            usage,
            cost,
            cumulative_usage,
            cumulative_cost,
        };

        debug!(
            run_id = %self.id,
            step = record.index,
            input_tokens = usage.input_tokens,
            cached_input_tokens = usage.cached_input_tokens,
            output_tokens = usage.output_tokens,
            step_cost_usd = %cost.total_cost,
            cumulative_cost_usd = %cumulative_cost.total_cost,
            "step recorded"
        );

        self.steps.push(record.clone());
        self.undiscounted_cost = undiscounted_cost;
        Ok(record)
    }

    /// Seal the run and return its summary.
    ///
    /// Totals are the sum of the recorded steps. When `reported_total` is
    /// given and differs from that sum in any field, the summary carries a
    /// single [`UsageReconciliationWarning`]. Sealing again returns the
    /// existing summary unchanged.
    pub fn seal(&mut self, reported_total: Option<&TokenUsage>) -> &RunSummary {
        let summary = match self.summary.take() {
            Some(existing) => {
                if let Some(reported) = reported_total
                    && existing.reported_total.as_ref() != Some(reported)
                {
                    debug!(
                        run_id = %self.id,
                        "run already sealed, ignoring new reported total"
                    );
                }
                existing
            }
            None => self.build_summary(reported_total),
        };
        self.summary.insert(summary)
    }

    fn build_summary(&self, reported_total: Option<&TokenUsage>) -> RunSummary {
        let (total_usage, total_cost) = self
            .steps
            .last()
            .map(|s| (s.cumulative_usage, s.cumulative_cost))
            .unwrap_or_default();

        let reconciliation = reported_total
            .and_then(|reported| UsageReconciliationWarning::compare(&total_usage, reported));
        if let Some(warning) = &reconciliation {
            let fields: Vec<String> = warning.fields().map(|f| f.to_string()).collect();
            warn!(
                run_id = %self.id,
                model = %self.model,
                fields = ?fields,
                "{warning}"
            );
        }

        info!(
            run_id = %self.id,
            model = %self.model,
            steps = self.steps.len(),
            input_tokens = total_usage.input_tokens,
            cached_input_tokens = total_usage.cached_input_tokens,
            output_tokens = total_usage.output_tokens,
            total_cost_usd = %total_cost.total_cost,
            reconciled = reconciliation.is_none(),
            "run sealed"
        );

        RunSummary {
            run_id: self.id.clone(),
            model: self.model.clone(),
            steps: self.steps.clone(),
            total_usage,
            total_cost,
            undiscounted_cost: self.undiscounted_cost,
            reported_total: reported_total.copied(),
            reconciliation,
        }
    }

    fn state_error(&self, operation: &str) -> TallyError {
        TallyError::InvalidRunState {
            run_id: self.id.to_string(),
            state: self.status().to_string(),
            operation: operation.to_string(),
        }
    }
}
