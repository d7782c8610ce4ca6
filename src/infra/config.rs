//! Layered defaults for the handful of numeric knobs the spec leaves as
//! "default N" — overridable via `bundlescope.toml` or `BUNDLESCOPE_*` env vars,
//! never required.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// C3 proximity-query radius, in bytes.
    pub landmark_radius: usize,
    /// C5 match context window, in bytes (each side).
    pub search_context: usize,
    /// C6 match context window, in bytes (each side).
    pub patch_context: usize,
    /// C6 replacement-preview window, in bytes (each side).
    pub patch_preview_context: usize,
    /// C10 window read around a channel occurrence, in bytes.
    pub trace_io_window: usize,
    /// C9 string-set diff minimum string length.
    pub string_diff_min_length: usize,
    /// C9 fuzzy-match Jaccard similarity threshold.
    pub diff_fuzzy_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            landmark_radius: 5_000,
            search_context: 80,
            patch_context: 200,
            patch_preview_context: 60,
            trace_io_window: 768,
            string_diff_min_length: 20,
            diff_fuzzy_threshold: 0.5,
        }
    }
}

/// Load config from `bundlescope.toml` (if present) layered under
/// `BUNDLESCOPE_`-prefixed environment variables. Absence of a config file is
/// not an error; [`Config::default`] is returned.
pub fn load_config() -> Result<Config> {
    let mut builder = config::Config::builder();

    for path in ["bundlescope.toml", ".bundlescope.toml"] {
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    builder = builder.add_source(config::Environment::with_prefix("BUNDLESCOPE").separator("_"));

    let defaults = Config::default();
    let built = builder
        .build()
        .context("failed to assemble configuration sources")?;

    match built.try_deserialize::<Config>() {
        Ok(cfg) => Ok(cfg),
        // No file and no matching env vars: builder yields an empty map, not our defaults.
        Err(_) => Ok(defaults),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.landmark_radius, 5_000);
        assert_eq!(cfg.search_context, 80);
        assert_eq!(cfg.patch_context, 200);
        assert_eq!(cfg.patch_preview_context, 60);
        assert_eq!(cfg.trace_io_window, 768);
        assert_eq!(cfg.string_diff_min_length, 20);
        assert!((cfg.diff_fuzzy_threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn load_config_without_file_falls_back_to_defaults() {
        let cfg = load_config().unwrap();
        assert_eq!(cfg.landmark_radius, 5_000);
    }
}
