// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tokentally.toml` > `~/.config/tokentally/tokentally.toml`
//! > `/etc/tokentally/tokentally.toml` with environment variable overrides via
//! the `TOKENTALLY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TallyConfig;

/// File name looked up in every configuration directory.
pub const CONFIG_FILE_NAME: &str = "tokentally.toml";

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tokentally/tokentally.toml";

/// Per-user configuration path, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tokentally").join(CONFIG_FILE_NAME))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tokentally/tokentally.toml` (system-wide)
/// 3. `~/.config/tokentally/tokentally.toml` (user XDG config)
/// 4. `./tokentally.toml` (local directory)
/// 5. `TOKENTALLY_*` environment variables
pub fn load_config() -> Result<TallyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TallyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
///
/// Unlike [`load_config`], a missing file is an error: the caller named it.
pub fn load_config_from_path(path: &Path) -> Result<TallyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::file_exact(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TOKENTALLY_COST_UNREPORTED_CACHE` must map to
/// `cost.unreported_cache`, not `cost.unreported.cache`. Pricing tiers are
/// file-only; model identifiers do not survive env var naming rules.
fn env_provider() -> Env {
    Env::prefixed("TOKENTALLY_")
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            key.starts_with("log_") || key.starts_with("cost_")
        })
        .map(|key| {
            let mapped = key
                .as_str()
                .to_ascii_lowercase()
                .replacen("log_", "log.", 1)
                .replacen("cost_", "cost.", 1);
            mapped.into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokentally_core::UnreportedCachePolicy;

    #[test]
    fn env_overrides_log_level_and_policy() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TOKENTALLY_LOG_LEVEL", "debug");
            jail.set_env("TOKENTALLY_COST_UNREPORTED_CACHE", "zero");
            let config = load_config()?;
            assert_eq!(config.log.level, "debug");
            assert_eq!(config.cost.unreported_cache, UnreportedCachePolicy::Zero);
            Ok(())
        });
    }

    #[test]
    fn local_file_adds_tier_and_keeps_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE_NAME,
                r#"
[pricing."claude-haiku-4-5"]
uncached_input_per_mtok = 1.0
cached_input_per_mtok = 0.10
output_per_mtok = 5.0
"#,
            )?;
            let config = load_config()?;
            assert!(config.pricing.contains_key("claude-haiku-4-5"));
            assert!(config.pricing.contains_key(crate::model::DEFAULT_MODEL));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let result = load_config_from_path(Path::new("/nonexistent/tokentally.toml"));
        assert!(result.is_err());
    }
}
