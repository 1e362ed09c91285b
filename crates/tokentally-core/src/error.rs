// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for cost accounting.

use thiserror::Error;

/// The error type returned by pricing, accumulation, and report handling.
///
/// None of these are retryable: each one describes bad input or a caller
/// mistake, and recomputing on the same input produces the same error.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Malformed token counts (cached exceeds input, negative or missing values).
    #[error("invalid usage: {message}")]
    InvalidUsage { message: String },

    /// No pricing tier is configured for the requested model.
    #[error("unknown model `{model}`{}", format_suggestion(suggestion.as_deref()))]
    UnknownModel {
        model: String,
        suggestion: Option<String>,
    },

    /// An operation was attempted on a run in a state that does not allow it.
    #[error("cannot {operation} run {run_id}: run is {state}")]
    InvalidRunState {
        run_id: String,
        state: String,
        operation: String,
    },

    /// Pricing table construction failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A recorded usage report could not be read or parsed.
    #[error("report error: {message}")]
    Report {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TallyError {
    /// Shorthand for [`TallyError::InvalidUsage`].
    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Self::InvalidUsage {
            message: message.into(),
        }
    }
}

fn format_suggestion(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    }
}
