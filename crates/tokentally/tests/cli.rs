// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the `tokentally` binary.

use std::path::Path;
use std::process::{Command, Output};

use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

const EMPTY_CONFIG: &str = "";

/// Run the binary with an explicit config file so no user or system config
/// leaks into the test.
fn run_tokentally(dir: &Path, config: &str, args: &[&str]) -> Output {
    let config_path = dir.join("tokentally.toml");
    std::fs::write(&config_path, config).expect("write config");

    Command::new(env!("CARGO_BIN_EXE_tokentally"))
        .arg("--config")
        .arg(&config_path)
        .arg("--plain")
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("TOKENTALLY_LOG_LEVEL")
        .env_remove("TOKENTALLY_COST_UNREPORTED_CACHE")
        .output()
        .expect("run tokentally")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_run(dir: &Path, name: &str, json: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, json).expect("write run file");
    path.display().to_string()
}

/// Six-step tool loop: context grows 40k tokens per step and the cache
/// covers everything but the newest page.
fn tool_loop_json(total_usage: Option<&str>) -> String {
    let steps: Vec<String> = (1..=6u64)
        .map(|n| {
            let input = 8_000 + n * 40_000;
            let cached = if n == 1 { 0 } else { input - 40_000 };
            format!(
                r#"{{"inputTokens": {input}, "cachedInputTokens": {cached}, "outputTokens": 1500}}"#
            )
        })
        .collect();
    match total_usage {
        Some(total) => format!(
            r#"{{"model": "gemini-3-flash-preview", "steps": [{}], "totalUsage": {total}}}"#,
            steps.join(",")
        ),
        None => format!(
            r#"{{"model": "gemini-3-flash-preview", "steps": [{}]}}"#,
            steps.join(",")
        ),
    }
}

#[test]
fn price_uncached_call() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        EMPTY_CONFIG,
        &[
            "price", "--model", "gemini-3-flash-preview", "--input", "2000000", "--cached", "0",
            "--output", "10000",
        ],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Total:     $1.030000"), "stdout: {text}");
}

#[test]
fn price_cached_call_json() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        EMPTY_CONFIG,
        &[
            "price", "--json", "--model", "google/gemini-3-flash-preview", "--input", "2000000",
            "--cached", "1800000", "--output", "10000",
        ],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let json: Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(json["model"], "gemini-3-flash-preview");
    assert_eq!(json["expected_cost_usd"], "$0.220000");
    assert_eq!(json["usage"]["cached_input_tokens"], 1_800_000);
}

#[test]
fn price_without_cached_is_rejected_by_default() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        EMPTY_CONFIG,
        &["price", "--model", "gemini-3-flash-preview", "--input", "100", "--output", "1"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("not reported"), "stderr: {}", stderr(&out));
}

#[test]
fn price_without_cached_under_zero_policy_warns() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        "[cost]\nunreported_cache = \"zero\"\n",
        &[
            "price", "--model", "gemini-3-flash-preview", "--input", "2000000", "--output",
            "10000",
        ],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("$1.030000"));
    assert!(stderr(&out).contains("assuming 0 cached tokens"));
}

#[test]
fn price_unknown_model_suggests() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        EMPTY_CONFIG,
        &[
            "price", "--model", "gemini-3-flash", "--input", "1", "--cached", "0", "--output", "1",
        ],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("did you mean `gemini-3-flash-preview`"));
}

#[test]
fn price_cached_above_input_fails() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        EMPTY_CONFIG,
        &[
            "price", "--model", "gemini-3-flash-preview", "--input", "10", "--cached", "11",
            "--output", "1",
        ],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("invalid usage"));
}

#[test]
fn replay_tool_loop_prints_steps_and_total() {
    let dir = TempDir::new().unwrap();
    let run = write_run(dir.path(), "loop.json", &tool_loop_json(None));
    let out = run_tokentally(dir.path(), EMPTY_CONFIG, &["replay", &run]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert_eq!(text.matches("    step ").count(), 6, "stdout: {text}");
    assert!(text.contains("Saved:"));
    assert!(!text.contains("Grand total"));
}

#[test]
fn replay_mismatched_total_warns_but_succeeds() {
    let dir = TempDir::new().unwrap();
    let json = tool_loop_json(Some(
        r#"{"inputTokens": 888000, "cachedInputTokens": 0, "outputTokens": 9000}"#,
    ));
    let run = write_run(dir.path(), "loop.json", &json);
    let out = run_tokentally(dir.path(), EMPTY_CONFIG, &["replay", &run]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("[WARN] reported total disagrees"), "stdout: {text}");
    assert!(text.contains("cached_input_tokens"));
}

#[test]
fn replay_unresolvable_total_still_prints_run() {
    let dir = TempDir::new().unwrap();
    let run = write_run(
        dir.path(),
        "loop.json",
        r#"{"model": "gemini-3-flash-preview",
            "steps": [{"inputTokens": 2000000, "cachedInputTokens": 0, "outputTokens": 10000}],
            "totalUsage": {"inputTokens": 100, "outputTokens": 5}}"#,
    );
    let out = run_tokentally(dir.path(), EMPTY_CONFIG, &["replay", &run]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Total:     $1.030000"), "stdout: {text}");
    assert!(
        text.contains("[WARN] reported total ignored: totalUsage:"),
        "stdout: {text}"
    );
    assert!(stderr(&out).contains("reported total unusable"));
}

#[test]
fn replay_unresolvable_total_is_flagged_in_json() {
    let dir = TempDir::new().unwrap();
    let run = write_run(
        dir.path(),
        "loop.json",
        r#"{"model": "gemini-3-flash-preview",
            "steps": [{"inputTokens": 10, "cachedInputTokens": 0, "outputTokens": 1}],
            "totalUsage": {"inputTokens": 10, "cachedInputTokens": 11, "outputTokens": 1}}"#,
    );
    let out = run_tokentally(dir.path(), EMPTY_CONFIG, &["--json", "replay", &run]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let json: Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    let flagged = &json["runs"][0];
    assert!(flagged["reported_total"].is_null());
    assert!(
        flagged["total_usage_error"]
            .as_str()
            .is_some_and(|e| e.starts_with("invalid usage: totalUsage:")),
        "run: {flagged}"
    );
}

#[test]
fn replay_multiple_files_json_has_grand_total() {
    let dir = TempDir::new().unwrap();
    let single = write_run(
        dir.path(),
        "single.json",
        r#"{"model": "gemini-3-flash-preview",
            "steps": [{"inputTokens": 2000000, "cachedInputTokens": 0, "outputTokens": 10000}]}"#,
    );
    let cached = write_run(
        dir.path(),
        "cached.json",
        r#"{"model": "gemini-3-flash-preview",
            "steps": [{"inputTokens": 2000000, "cachedInputTokens": 1800000, "outputTokens": 10000}]}"#,
    );
    let out = run_tokentally(dir.path(), EMPTY_CONFIG, &["--json", "replay", &single, &cached]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let json: Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(json["runs"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["total_cost_usd"], "$1.250000");
    let savings: Decimal = json["runs"][1]["cache_savings"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("decimal string");
    assert_eq!(savings, Decimal::new(81, 2));
}

#[test]
fn replay_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(dir.path(), EMPTY_CONFIG, &["replay", "does-not-exist.json"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("failed to read"));
}

#[test]
fn models_lists_configured_tiers() {
    let dir = TempDir::new().unwrap();
    let config = r#"
[pricing."gpt-5"]
uncached_input_per_mtok = 1.25
cached_input_per_mtok = 0.125
output_per_mtok = 10.0
"#;
    let out = run_tokentally(dir.path(), config, &["models"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("gemini-3-flash-preview"));
    assert!(text.contains("gpt-5"));
}

#[test]
fn cached_rate_above_uncached_warns_on_stderr() {
    let dir = TempDir::new().unwrap();
    let config = r#"
[pricing."odd-model"]
uncached_input_per_mtok = 0.10
cached_input_per_mtok = 0.50
output_per_mtok = 1.0
"#;
    let out = run_tokentally(dir.path(), config, &["models"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(
        err.contains("cached input rate exceeds uncached input rate"),
        "stderr: {err}"
    );
    assert!(err.contains("odd-model"), "stderr: {err}");
}

#[test]
fn plain_log_output_has_no_ansi_escapes() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(
        dir.path(),
        "[cost]\nunreported_cache = \"zero\"\n",
        &["price", "--model", "gemini-3-flash-preview", "--input", "10", "--output", "1"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("assuming 0 cached tokens"), "stderr: {err}");
    assert!(!err.contains('\u{1b}'), "stderr: {err:?}");
}

#[test]
fn config_error_exits_with_two() {
    let dir = TempDir::new().unwrap();
    let out = run_tokentally(dir.path(), "[log]\nlevle = \"debug\"\n", &["models"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("level"));
}
