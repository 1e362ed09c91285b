// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal and JSON output for the CLI commands.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tokentally_core::{TallyError, TokenUsage};
use tokentally_cost::{format_usd, CostBreakdown, PricingTable, PricingTier, RunSummary};

use crate::replay::Replay;

/// Output mode chosen from the global flags.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub json: bool,
    pub color: bool,
}

impl Style {
    fn money(&self, amount: Decimal) -> String {
        let text = format_usd(amount);
        if self.color {
            text.as_str().green().to_string()
        } else {
            text
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.color {
            format!("{} {}", "!".yellow(), text.yellow())
        } else {
            format!("[WARN] {text}")
        }
    }
}

#[derive(Serialize)]
struct PriceOutput<'a> {
    model: &'a str,
    usage: &'a TokenUsage,
    cost: &'a CostBreakdown,
    expected_cost_usd: String,
}

#[derive(Serialize)]
struct ReplayOutput<'a> {
    runs: Vec<RunOutput<'a>>,
    total_cost: Decimal,
    total_cost_usd: String,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    file: String,
    #[serde(flatten)]
    summary: &'a RunSummary,
    cache_savings: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_usage_error: Option<&'a str>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TallyError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| TallyError::Report {
        message: format!("failed to serialize output: {e}"),
        source: Some(Box::new(e)),
    })?;
    println!("{text}");
    Ok(())
}

/// `tokentally price` output.
pub fn print_price(
    model: &str,
    usage: &TokenUsage,
    cost: &CostBreakdown,
    style: Style,
) -> Result<(), TallyError> {
    if style.json {
        return print_json(&PriceOutput {
            model,
            usage,
            cost,
            expected_cost_usd: format_usd(cost.total_cost),
        });
    }

    println!();
    println!("  {}", style.heading(model));
    println!("  {}", "-".repeat(35));
    println!(
        "    Input:     {} tokens ({} cached)",
        usage.input_tokens, usage.cached_input_tokens
    );
    println!("    Output:    {} tokens", usage.output_tokens);
    println!("    Uncached:  {}", style.money(cost.uncached_cost));
    println!("    Cached:    {}", style.money(cost.cached_cost));
    println!("    Output:    {}", style.money(cost.output_cost));
    println!("    Total:     {}", style.money(cost.total_cost));
    println!();
    Ok(())
}

/// `tokentally replay` output for one or more runs.
pub fn print_replay(runs: &[(PathBuf, Replay)], style: Style) -> Result<(), TallyError> {
    let grand_total = runs
        .iter()
        .try_fold(Decimal::ZERO, |acc, (_, r)| {
            acc.checked_add(r.summary.total_cost.total_cost)
        })
        .ok_or_else(|| TallyError::invalid_usage("grand total exceeds decimal range"))?;

    if style.json {
        let out = ReplayOutput {
            runs: runs
                .iter()
                .map(|(path, replay)| RunOutput {
                    file: path.display().to_string(),
                    summary: &replay.summary,
                    cache_savings: replay.summary.cache_savings(),
                    total_usage_error: replay.total_usage_error.as_deref(),
                })
                .collect(),
            total_cost: grand_total,
            total_cost_usd: format_usd(grand_total),
        };
        return print_json(&out);
    }

    for (path, replay) in runs {
        print_run(path, replay, style);
    }
    if runs.len() > 1 {
        println!(
            "  Grand total ({} runs): {}",
            runs.len(),
            style.money(grand_total)
        );
        println!();
    }
    Ok(())
}

fn print_run(path: &Path, replay: &Replay, style: Style) {
    let summary = &replay.summary;
    println!();
    println!(
        "  {}  {}  (run {})",
        style.heading(&path.display().to_string()),
        summary.model,
        summary.run_id
    );
    println!("  {}", "-".repeat(35));

    for step in &summary.steps {
        println!(
            "    step {:>3}  in {:>9} (cached {:>9})  out {:>7}  cost {}  cumulative {}",
            step.index,
            step.usage.input_tokens,
            step.usage.cached_input_tokens,
            step.usage.output_tokens,
            style.money(step.cost.total_cost),
            style.money(step.cumulative_cost.total_cost),
        );
    }

    let total = &summary.total_usage;
    println!(
        "    Tokens:    {} in ({} cached), {} out",
        total.input_tokens, total.cached_input_tokens, total.output_tokens
    );
    println!("    Total:     {}", style.money(summary.total_cost.total_cost));
    println!(
        "    Saved:     {} by cached input",
        style.money(summary.cache_savings())
    );
    if let Some(warning) = &summary.reconciliation {
        println!("    {}", style.warning(&warning.to_string()));
    }
    if let Some(error) = &replay.total_usage_error {
        println!(
            "    {}",
            style.warning(&format!("reported total ignored: {error}"))
        );
    }
    println!();
}

/// `tokentally models` output.
pub fn print_models(table: &PricingTable, style: Style) -> Result<(), TallyError> {
    if style.json {
        let tiers: BTreeMap<&str, &PricingTier> = table.models().collect();
        return print_json(&tiers);
    }

    println!();
    println!("  {}", style.heading("Pricing tiers (USD per million tokens)"));
    println!("  {}", "-".repeat(35));
    for (model, tier) in table.models() {
        println!(
            "    {model:<32} input {:>8}  cached {:>8}  output {:>8}",
            tier.uncached_input_per_mtok, tier.cached_input_per_mtok, tier.output_per_mtok
        );
    }
    println!();
    Ok(())
}
