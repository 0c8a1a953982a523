//! # bert-weights
//!
//! Pretrained weights for [`bert_model::BertModel`]: a catalog of known
//! checkpoints, a download cache, checkpoint variable renaming and a loader
//! that copies renamed tensors into a freshly constructed model.
//!
//! ```rust,no_run
//! use bert_weights::{LoaderConfig, WeightLoader};
//!
//! # fn main() -> bert_weights::Result<()> {
//! let loader = WeightLoader::new(&LoaderConfig::from_env());
//! let loaded = loader.load("bert_tiny_uncased")?;
//! assert!(loaded.report.is_complete());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod checkpoint;
mod error;
mod fetch;
mod loader;
mod rename;
mod utils;

pub use catalog::{CatalogEntry, ModelSource, available_berts, catalog, config_bert, load_hf_config, model_source};
pub use checkpoint::{Checkpoint, read_checkpoint, save_checkpoint, write_checkpoint};
pub use error::{LoadError, Result};
pub use fetch::{Fetcher, HttpFetcher, WeightCache};
pub use loader::{LoadReport, LoadedModel, WeightLoader, assign_checkpoint, load_from_file};
pub use rename::{RENAME_RULES, RenameRule, rename_checkpoint, rename_variable};

use bert_model::BertModel;
use std::{env, path::PathBuf};

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "BERT_SPINE_CACHE";

const CACHE_DIR_NAME: &str = "bert-spine";

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub cache_dir: PathBuf,
    pub offline: bool,
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// Default cache directory, online.
    pub fn from_env() -> Self {
        Self { cache_dir: default_cache_dir(), offline: false }
    }
}

#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    cache_dir: Option<PathBuf>,
    offline: Option<bool>,
}

impl LoaderConfigBuilder {
    pub fn cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }
    pub fn offline(mut self, offline: Option<bool>) -> Self {
        self.offline = offline;
        self
    }
    pub fn build(self) -> LoaderConfig {
        LoaderConfig {
            cache_dir: self.cache_dir.unwrap_or_else(default_cache_dir),
            offline: self.offline.unwrap_or(false),
        }
    }
}

/// Resolves the cache root: `BERT_SPINE_CACHE`, then `$XDG_CACHE_HOME/bert-spine`,
/// then `$HOME/.cache/bert-spine`, falling back to the system temp directory.
pub fn default_cache_dir() -> PathBuf {
    let non_empty = |key: &str| env::var_os(key).filter(|value| !value.is_empty()).map(PathBuf::from);

    if let Some(dir) = non_empty(CACHE_DIR_ENV) {
        return dir;
    }
    if let Some(dir) = non_empty("XDG_CACHE_HOME") {
        return dir.join(CACHE_DIR_NAME);
    }
    if let Some(home) = non_empty("HOME") {
        return home.join(".cache").join(CACHE_DIR_NAME);
    }
    env::temp_dir().join(CACHE_DIR_NAME)
}

/// Constructs the named catalog model and loads its pretrained weights
/// using the default cache.
pub fn make_and_load_bert(model_name: &str) -> Result<BertModel> {
    let loader = WeightLoader::new(&LoaderConfig::from_env());
    loader.load(model_name).map(|loaded| loaded.model)
}
