use std::path::PathBuf;

use crate::error::AppError;
use crate::resilience::RecoveryPolicy;

/// Process-level pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the Markdown vault. `None` disables persistence to disk.
    pub vault_path: Option<PathBuf>,
    /// Directory holding `<template-id>.md` bodies.
    pub templates_dir: PathBuf,
    /// Where storage fallbacks write their backups.
    pub temp_dir: PathBuf,
    /// Expose underlying error causes to API clients.
    pub development: bool,
    pub recovery: RecoveryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vault_path: None,
            templates_dir: PathBuf::from("templates"),
            temp_dir: std::env::temp_dir().join("clipper"),
            development: false,
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `CLIPPER_VAULT_PATH` (optional)
    /// - `CLIPPER_TEMPLATES_DIR` (optional, defaults to `templates`)
    /// - `CLIPPER_TEMP_DIR` (optional, defaults to `<system temp>/clipper`)
    /// - `CLIPPER_ENV` (optional, `development` exposes error causes)
    /// - recovery settings, see [`RecoveryPolicy::from_env`]
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let vault_path = match std::env::var("CLIPPER_VAULT_PATH") {
            Ok(raw) if raw.trim().is_empty() => {
                return Err(AppError::ConfigError(
                    "CLIPPER_VAULT_PATH is set but empty".into(),
                ));
            }
            Ok(raw) => Some(PathBuf::from(raw)),
            Err(_) => None,
        };

        let templates_dir = std::env::var("CLIPPER_TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.templates_dir);
        let temp_dir = std::env::var("CLIPPER_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.temp_dir);
        let development = std::env::var("CLIPPER_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        Ok(Self {
            vault_path,
            templates_dir,
            temp_dir,
            development,
            recovery: RecoveryPolicy::from_env()?,
        })
    }
}
