use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// File name searched for by [`LaunchConfig::find`].
pub const CONFIG_FILE: &str = "ndloop.toml";

/// Launch settings, read from the `[launch]` section of ndloop.toml.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Worker threads for parallel dispatch. `None` lets the pool decide.
    pub workers: Option<usize>,
    /// Upper bound on tuples a static expansion may materialize.
    pub unroll_limit: u64,
    /// Report loop-variable/rank mismatches on every call.
    pub arity_warnings: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            unroll_limit: 65536,
            arity_warnings: true,
        }
    }
}

fn config_error(message: String) -> Diagnostic {
    Diagnostic::error(message, Span::dummy())
}

fn parse_count(key: &str, value: &str) -> Result<u64, Diagnostic> {
    value.parse::<u64>().map_err(|_| {
        config_error(format!(
            "'{}' must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Diagnostic> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(config_error(format!(
            "'{}' must be true or false, got '{}'",
            key, value
        ))),
    }
}

impl LaunchConfig {
    /// Load settings from an ndloop.toml file.
    pub fn load(toml_path: &Path) -> Result<LaunchConfig, Diagnostic> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            config_error(format!("cannot read '{}': {}", toml_path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Section-aware minimal TOML parsing. Keys outside `[launch]` are ignored.
    pub fn parse(content: &str) -> Result<LaunchConfig, Diagnostic> {
        let mut config = LaunchConfig::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            if current_section != "launch" {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim().trim_matches('"');
                let value = value.split('#').next().unwrap_or("").trim();
                match key {
                    "workers" => {
                        let n = parse_count(key, value)?;
                        if n == 0 {
                            return Err(config_error("'workers' must be at least 1".to_string()));
                        }
                        config.workers = Some(n as usize);
                    }
                    "unroll_limit" => config.unroll_limit = parse_count(key, value)?,
                    "arity_warnings" => config.arity_warnings = parse_bool(key, value)?,
                    _ => {
                        return Err(config_error(format!(
                            "unknown key '{}' in [launch]",
                            key
                        ))
                        .with_help("known keys: workers, unroll_limit, arity_warnings".to_string()))
                    }
                }
            }
        }

        Ok(config)
    }

    /// Try to find an ndloop.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Load the nearest ndloop.toml, or fall back to defaults when there is none.
    pub fn discover(start_dir: &Path) -> Result<LaunchConfig, Diagnostic> {
        match Self::find(start_dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading launch config");
                Self::load(&path)
            }
            None => Ok(LaunchConfig::default()),
        }
    }
}
