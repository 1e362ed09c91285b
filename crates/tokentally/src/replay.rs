// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tokentally replay`: recorded run files.
//!
//! A recorded run is the usage a tool loop reported, one entry per model
//! invocation, plus the aggregate the upstream source reported for the whole
//! task when it has one:
//!
//! ```json
//! {
//!   "model": "gemini-3-flash-preview",
//!   "steps": [{ "inputTokens": 1200, "outputTokens": 80, "cachedInputTokens": 0 }],
//!   "totalUsage": { "inputTokens": 1200, "outputTokens": 80, "cachedInputTokens": 0 }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use tokentally_core::{TallyError, UnreportedCachePolicy, UsageReport};
use tokentally_cost::{RunSummary, UsageAccumulator};
use tracing::{debug, warn};

/// One recorded run as read from disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordedRun {
    pub model: String,
    pub steps: Vec<UsageReport>,
    #[serde(default)]
    pub total_usage: Option<UsageReport>,
}

/// Read and parse a recorded run file.
pub fn load_recorded_run(path: &Path) -> Result<RecordedRun, TallyError> {
    let content = std::fs::read_to_string(path).map_err(|e| TallyError::Report {
        message: format!("failed to read {}: {e}", path.display()),
        source: Some(Box::new(e)),
    })?;
    let recorded: RecordedRun = serde_json::from_str(&content).map_err(|e| TallyError::Report {
        message: format!("failed to parse {}: {e}", path.display()),
        source: Some(Box::new(e)),
    })?;
    debug!(
        path = %path.display(),
        model = %recorded.model,
        steps = recorded.steps.len(),
        "recorded run loaded"
    );
    Ok(recorded)
}

/// Outcome of replaying one recorded run.
#[derive(Debug, Clone)]
pub struct Replay {
    pub summary: RunSummary,
    /// Why the recorded `totalUsage` could not be used, if it was present
    /// but unusable. The run is then sealed without a reported total.
    pub total_usage_error: Option<String>,
}

/// Record every step in order and seal against the reported total, if any.
///
/// Fails on the first bad step; no partial summary is returned. A
/// `totalUsage` that cannot be resolved does not fail the replay: it is an
/// upstream defect, so the run is sealed on its steps alone and the problem
/// is returned alongside the summary.
pub fn replay_run(
    accumulator: &UsageAccumulator,
    recorded: &RecordedRun,
    policy: UnreportedCachePolicy,
) -> Result<Replay, TallyError> {
    let mut run = accumulator.begin(&recorded.model)?;

    for (i, report) in recorded.steps.iter().enumerate() {
        let usage = report
            .resolve(policy)
            .map_err(|e| with_context(e, &format!("step {}", i + 1)))?;
        run.record_step(usage)
            .map_err(|e| with_context(e, &format!("step {}", i + 1)))?;
    }

    let resolved_total = recorded
        .total_usage
        .as_ref()
        .map(|report| report.resolve(policy));
    let (reported, total_usage_error) = match resolved_total {
        None => (None, None),
        Some(Ok(usage)) => (Some(usage), None),
        Some(Err(e)) => {
            let message = with_context(e, "totalUsage").to_string();
            warn!(
                run_id = %run.id(),
                model = %run.model(),
                error = %message,
                "reported total unusable, sealing on summed steps"
            );
            (None, Some(message))
        }
    };

    Ok(Replay {
        summary: run.seal(reported.as_ref()).clone(),
        total_usage_error,
    })
}

fn with_context(err: TallyError, context: &str) -> TallyError {
    match err {
        TallyError::InvalidUsage { message } => TallyError::InvalidUsage {
            message: format!("{context}: {message}"),
        },
        other => other,
    }
}
