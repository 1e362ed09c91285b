// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types for the tokentally cost accounting workspace.
//!
//! This crate provides the error type and the token usage types used by the
//! pricing model, the usage accumulator, and the configuration layer.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TallyError;
pub use types::{InputTokenDetails, RunId, TokenUsage, UnreportedCachePolicy, UsageReport};
