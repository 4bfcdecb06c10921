//! Layered configuration for the index.
//!
//! Same shape as the teacher's config layer: compiled defaults, then an
//! `index.toml` in the workspace root, then environment variables, then
//! explicit CLI overrides.
//!
//! # Environment Variables
//!
//! Prefixed `SCIP_IDX_`, double underscore separates nested levels:
//! - `SCIP_IDX_SCANNER__MAX_CONCURRENCY=4`
//! - `SCIP_IDX_LOGGING__DEFAULT=debug`

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_index_folder")]
    pub index_folder: PathBuf,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "default_start_bucket_size")]
    pub start_bucket_size: usize,

    #[serde(default = "default_bucket_count")]
    pub bucket_count: usize,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_index_folder() -> PathBuf {
    PathBuf::from(".")
}
fn default_start_bucket_size() -> usize {
    4096
}
fn default_bucket_count() -> usize {
    8
}
fn default_max_concurrency() -> usize {
    num_cpus::get()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_folder: default_index_folder(),
            scanner: ScannerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            start_bucket_size: default_start_bucket_size(),
            bucket_count: default_bucket_count(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Compiled defaults → `index.toml` (if present) → `SCIP_IDX_`-prefixed
    /// environment variables, double underscore as the nesting separator.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file("index.toml"))
            .merge(
                Env::prefixed("SCIP_IDX_").map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(
                Env::prefixed("SCIP_IDX_").map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
    }
}
