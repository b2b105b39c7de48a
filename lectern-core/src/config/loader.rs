//! File format detection and environment variable substitution.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::{LecternError, Result};

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("env var pattern is a valid regex")
});

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(LecternError::configuration(format!(
                "Unsupported configuration file: {}",
                path.display()
            ))),
        }
    }
}

/// Substitute environment variables in configuration content.
///
/// Supports the format `${VAR_NAME}` and `${VAR_NAME:default_value}`. Unset
/// variables without a default become empty strings.
pub fn substitute_env_variables(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |captures: &regex::Captures<'_>| {
            let default_value = captures.get(2).map_or("", |m| m.as_str());
            std::env::var(&captures[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
