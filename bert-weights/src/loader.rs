#[cfg(test)]
#[path = "../tests/unit/loader_test.rs"]
mod loader_test;

use bert_model::{BertConfig, BertModel, Tensor};
use log::{info, warn};
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::LoaderConfig;
use crate::catalog::{config_bert, model_source};
use crate::checkpoint::read_checkpoint;
use crate::error::{LoadError, Result};
use crate::fetch::{Fetcher, HttpFetcher, WeightCache};
use crate::rename::{RENAME_RULES, rename_checkpoint, rename_variable};

/// Outcome of copying a checkpoint into a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters that received checkpoint values
    pub loaded: usize,
    /// Renamed checkpoint variables with no matching parameter
    pub unused_checkpoint: Vec<String>,
    /// Model parameters the checkpoint did not provide
    pub missing_parameters: Vec<String>,
}

impl LoadReport {
    /// True when every model parameter was loaded.
    pub fn is_complete(&self) -> bool {
        self.missing_parameters.is_empty()
    }
}

/// A model with pretrained weights and the report of how they were applied.
#[derive(Debug)]
pub struct LoadedModel {
    pub model: BertModel,
    pub report: LoadReport,
}

/// Builds models from the catalog and fills them with cached pretrained weights.
#[derive(Debug)]
pub struct WeightLoader<F: Fetcher = HttpFetcher> {
    cache: WeightCache<F>,
}

impl WeightLoader<HttpFetcher> {
    pub fn new(config: &LoaderConfig) -> Self {
        Self::with_fetcher(config, HttpFetcher)
    }
}

impl<F: Fetcher> WeightLoader<F> {
    pub fn with_fetcher(config: &LoaderConfig, fetcher: F) -> Self {
        Self { cache: WeightCache::new(config.cache_dir.clone(), fetcher, config.offline) }
    }

    pub fn cache(&self) -> &WeightCache<F> {
        &self.cache
    }

    /// Returns the local path of the named model's checkpoint, downloading it on first use.
    pub fn fetch_checkpoint(&self, model_name: &str) -> Result<PathBuf> {
        let source = model_source(model_name)?;
        self.cache.get_or_fetch(model_name, source.weights_url)
    }

    /// Returns the local path of the named model's vocabulary, downloading it on first use.
    pub fn fetch_vocab(&self, model_name: &str) -> Result<PathBuf> {
        let source = model_source(model_name)?;
        self.cache.get_or_fetch(model_name, source.vocab_url)
    }

    /// Constructs the named model and loads its pretrained weights.
    ///
    /// The name is resolved before any network access, so an unknown model
    /// fails without touching the cache or the fetcher.
    pub fn load(&self, model_name: &str) -> Result<LoadedModel> {
        let config = config_bert(model_name)?;
        let checkpoint_path = self.fetch_checkpoint(model_name)?;

        info!("🚀 Loading {model_name} from {}", checkpoint_path.display());
        load_from_file(&checkpoint_path, config)
    }
}

/// Constructs a model for `config` and loads a local checkpoint into it.
///
/// Tensors with an unreadable dtype are reported as unused, unless the model
/// has a parameter of that name.
pub fn load_from_file(checkpoint_path: &Path, config: BertConfig) -> Result<LoadedModel> {
    let checkpoint = read_checkpoint(checkpoint_path)?;
    let tensors = rename_checkpoint(checkpoint.tensors, RENAME_RULES);
    let unsupported = checkpoint
        .unsupported
        .into_iter()
        .map(|(name, dtype)| (rename_variable(&name, RENAME_RULES), dtype))
        .collect::<Vec<_>>();

    let mut model = BertModel::new(config).map_err(LoadError::model)?;

    if let Some((name, dtype)) = unsupported.iter().find(|(name, _)| model.parameters().contains(name)) {
        return Err(LoadError::Deserialize {
            path: checkpoint_path.to_path_buf(),
            message: format!("parameter '{name}' has unsupported dtype {dtype}"),
        });
    }

    let mut report = assign_checkpoint(&mut model, tensors)?;
    report.unused_checkpoint.extend(unsupported.into_iter().map(|(name, _)| name));
    report.unused_checkpoint.sort();

    Ok(LoadedModel { model, report })
}

/// Copies renamed checkpoint tensors into the parameters of the same name.
///
/// Every matched shape is checked before anything is written, so on a
/// `ShapeMismatch` the model keeps its previous values. Names present on only
/// one side are reported and logged as warnings.
pub fn assign_checkpoint(model: &mut BertModel, tensors: HashMap<String, Tensor>) -> Result<LoadReport> {
    let params = model.parameters();

    let mut entries = tensors.into_iter().collect::<Vec<_>>();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut staged = Vec::with_capacity(params.len());
    let mut unused_checkpoint = Vec::new();

    for (name, tensor) in entries {
        match params.shape(&name) {
            Some(expected) if expected != tensor.shape.as_slice() => {
                return Err(LoadError::ShapeMismatch {
                    expected: expected.to_vec(),
                    actual: tensor.shape,
                    name,
                });
            }
            Some(_) => staged.push((name, tensor)),
            None => unused_checkpoint.push(name),
        }
    }

    let staged_names = staged.iter().map(|(name, _)| name.as_str()).collect::<HashSet<_>>();
    let missing_parameters = params
        .names()
        .filter(|name| !staged_names.contains(name))
        .map(str::to_string)
        .collect::<Vec<_>>();

    let loaded = staged.len();
    let params = model.parameters_mut();
    for (name, tensor) in staged {
        params.assign(&name, tensor).map_err(LoadError::model)?;
    }

    if !unused_checkpoint.is_empty() {
        warn!(
            "{} checkpoint variables have no matching parameter: {}",
            unused_checkpoint.len(),
            unused_checkpoint.join(", ")
        );
    }
    if !missing_parameters.is_empty() {
        warn!(
            "{} parameters were not found in the checkpoint: {}",
            missing_parameters.len(),
            missing_parameters.join(", ")
        );
    }
    info!("✅ Loaded {loaded} of {} parameters", params.len());

    Ok(LoadReport { loaded, unused_checkpoint, missing_parameters })
}
