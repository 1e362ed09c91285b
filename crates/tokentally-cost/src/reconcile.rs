// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparison of summed step usage against an independently reported total.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokentally_core::TokenUsage;

/// A token-count field of [`TokenUsage`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UsageField {
    InputTokens,
    CachedInputTokens,
    OutputTokens,
}

/// One field where the summed steps and the reported total disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiscrepancy {
    pub field: UsageField,
    pub summed: u64,
    pub reported: u64,
}

impl FieldDiscrepancy {
    /// `reported - summed`, signed.
    pub fn delta(&self) -> i128 {
        i128::from(self.reported) - i128::from(self.summed)
    }
}

/// Attached to a run summary when the reported run total does not equal the
/// sum of the recorded steps. The summed values are authoritative for cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReconciliationWarning {
    pub discrepancies: Vec<FieldDiscrepancy>,
}

impl UsageReconciliationWarning {
    /// Compare field by field. `None` when every field matches.
    pub fn compare(summed: &TokenUsage, reported: &TokenUsage) -> Option<Self> {
        let fields = [
            (
                UsageField::InputTokens,
                summed.input_tokens,
                reported.input_tokens,
            ),
            (
                UsageField::CachedInputTokens,
                summed.cached_input_tokens,
                reported.cached_input_tokens,
            ),
            (
                UsageField::OutputTokens,
                summed.output_tokens,
                reported.output_tokens,
            ),
        ];

        let discrepancies: Vec<FieldDiscrepancy> = fields
            .into_iter()
            .filter(|(_, s, r)| s != r)
            .map(|(field, summed, reported)| FieldDiscrepancy {
                field,
                summed,
                reported,
            })
            .collect();

        if discrepancies.is_empty() {
            None
        } else {
            Some(Self { discrepancies })
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = UsageField> + '_ {
        self.discrepancies.iter().map(|d| d.field)
    }
}

impl fmt::Display for UsageReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reported total disagrees with summed steps:")?;
        for (i, d) in self.discrepancies.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(
                f,
                "{sep}{} summed={} reported={} ({:+})",
                d.field,
                d.summed,
                d.reported,
                d.delta()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, cached: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            cached_input_tokens: cached,
            output_tokens: output,
        }
    }

    #[test]
    fn matching_totals_produce_no_warning() {
        let u = usage(1000, 200, 50);
        assert_eq!(UsageReconciliationWarning::compare(&u, &u), None);
    }

    #[test]
    fn every_mismatching_field_is_listed_once() {
        let warning =
            UsageReconciliationWarning::compare(&usage(1000, 200, 50), &usage(1000, 0, 40))
                .unwrap();
        let fields: Vec<UsageField> = warning.fields().collect();
        assert_eq!(
            fields,
            vec![UsageField::CachedInputTokens, UsageField::OutputTokens]
        );
        assert_eq!(warning.discrepancies[0].delta(), -200);
    }

    #[test]
    fn display_names_fields_and_deltas() {
        let warning =
            UsageReconciliationWarning::compare(&usage(100, 0, 10), &usage(120, 0, 10)).unwrap();
        assert_eq!(
            warning.to_string(),
            "reported total disagrees with summed steps: input_tokens summed=100 reported=120 (+20)"
        );
    }

    #[test]
    fn field_names_parse_back() {
        assert_eq!(
            "cached_input_tokens".parse::<UsageField>().unwrap(),
            UsageField::CachedInputTokens
        );
    }
}
