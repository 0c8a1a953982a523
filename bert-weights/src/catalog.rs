#[cfg(test)]
#[path = "../tests/unit/catalog_test.rs"]
mod catalog_test;

use bert_model::{BertConfig, LAYER_NORM_EPS, TOKEN_TYPE_VOCAB_SIZE};
use log::info;
use serde::Deserialize;
use std::path::Path;

use crate::error::{LoadError, Result};

/// Pretrained model known to the catalog.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub config: BertConfig,
}

/// Remote files of a pretrained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSource {
    /// safetensors checkpoint
    pub weights_url: &'static str,
    /// WordPiece vocabulary, one token per line
    pub vocab_url: &'static str,
    /// Whether the vocabulary expects lowercased input
    pub lowercase: bool,
}

const MAX_TOKENS: usize = 512;
const UNCASED_VOCAB: usize = 30522;
const CASED_VOCAB: usize = 28996;

#[rustfmt::skip]
const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { name: "bert_tiny_uncased", config: BertConfig::new(128, 2, 2, MAX_TOKENS, UNCASED_VOCAB) },
    CatalogEntry { name: "bert_mini_uncased", config: BertConfig::new(256, 4, 4, MAX_TOKENS, UNCASED_VOCAB) },
    CatalogEntry { name: "bert_small_uncased", config: BertConfig::new(512, 4, 8, MAX_TOKENS, UNCASED_VOCAB) },
    CatalogEntry { name: "bert_medium_uncased", config: BertConfig::new(512, 8, 8, MAX_TOKENS, UNCASED_VOCAB) },
    CatalogEntry { name: "bert_base_uncased", config: BertConfig::new(768, 12, 12, MAX_TOKENS, UNCASED_VOCAB) },
    CatalogEntry { name: "bert_base_cased", config: BertConfig::new(768, 12, 12, MAX_TOKENS, CASED_VOCAB) },
    CatalogEntry { name: "bert_large_uncased", config: BertConfig::new(1024, 24, 16, MAX_TOKENS, UNCASED_VOCAB) },
];

#[rustfmt::skip]
const SOURCES: &[(&str, ModelSource)] = &[
    ("bert_tiny_uncased", ModelSource {
        weights_url: "https://huggingface.co/google/bert_uncased_L-2_H-128_A-2/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google/bert_uncased_L-2_H-128_A-2/resolve/main/vocab.txt",
        lowercase: true,
    }),
    ("bert_mini_uncased", ModelSource {
        weights_url: "https://huggingface.co/google/bert_uncased_L-4_H-256_A-4/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google/bert_uncased_L-4_H-256_A-4/resolve/main/vocab.txt",
        lowercase: true,
    }),
    ("bert_small_uncased", ModelSource {
        weights_url: "https://huggingface.co/google/bert_uncased_L-4_H-512_A-8/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google/bert_uncased_L-4_H-512_A-8/resolve/main/vocab.txt",
        lowercase: true,
    }),
    ("bert_medium_uncased", ModelSource {
        weights_url: "https://huggingface.co/google/bert_uncased_L-8_H-512_A-8/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google/bert_uncased_L-8_H-512_A-8/resolve/main/vocab.txt",
        lowercase: true,
    }),
    ("bert_base_uncased", ModelSource {
        weights_url: "https://huggingface.co/google-bert/bert-base-uncased/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google-bert/bert-base-uncased/resolve/main/vocab.txt",
        lowercase: true,
    }),
    ("bert_base_cased", ModelSource {
        weights_url: "https://huggingface.co/google-bert/bert-base-cased/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google-bert/bert-base-cased/resolve/main/vocab.txt",
        lowercase: false,
    }),
    ("bert_large_uncased", ModelSource {
        weights_url: "https://huggingface.co/google-bert/bert-large-uncased/resolve/main/model.safetensors",
        vocab_url: "https://huggingface.co/google-bert/bert-large-uncased/resolve/main/vocab.txt",
        lowercase: true,
    }),
];

/// Every pretrained model with its configuration, in catalog order.
pub fn catalog() -> &'static [CatalogEntry] {
    CATALOG
}

/// Names of every pretrained model, in catalog order.
pub fn available_berts() -> Vec<&'static str> {
    catalog().iter().map(|entry| entry.name).collect()
}

/// Architecture of a named pretrained model.
pub fn config_bert(name: &str) -> Result<BertConfig> {
    CATALOG
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.config)
        .ok_or_else(|| unknown_model(name))
}

/// Download locations of a named pretrained model.
pub fn model_source(name: &str) -> Result<&'static ModelSource> {
    SOURCES
        .iter()
        .find(|(source_name, _)| *source_name == name)
        .map(|(_, source)| source)
        .ok_or_else(|| unknown_model(name))
}

fn unknown_model(name: &str) -> LoadError {
    LoadError::UnknownModel { name: name.to_string(), available: available_berts().join(", ") }
}

/// Load model configuration from a HuggingFace `config.json`.
pub fn load_hf_config(config_path: &Path) -> anyhow::Result<BertConfig> {
    let contents = std::fs::read_to_string(config_path)
        .map_err(|err| anyhow::anyhow!("Failed to open config.json at {}: {}", config_path.display(), err))?;

    #[derive(Debug, Deserialize)]
    struct HFConfig {
        hidden_size: usize,
        num_hidden_layers: usize,
        num_attention_heads: usize,
        max_position_embeddings: usize,
        vocab_size: usize,
        #[serde(default)]
        intermediate_size: Option<usize>,
        #[serde(default)]
        type_vocab_size: Option<usize>,
        #[serde(default)]
        layer_norm_eps: Option<f32>,
    }

    let hf_config: HFConfig = serde_json::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config.json: {}", err))?;

    let config = BertConfig {
        embedding_size: hf_config.hidden_size,
        n_layers: hf_config.num_hidden_layers,
        n_heads: hf_config.num_attention_heads,
        max_tokens: hf_config.max_position_embeddings,
        vocab_size: hf_config.vocab_size,
        token_type_vocab_size: hf_config.type_vocab_size.unwrap_or(TOKEN_TYPE_VOCAB_SIZE),
        layer_norm_eps: hf_config.layer_norm_eps.unwrap_or(LAYER_NORM_EPS),
    };

    match hf_config.intermediate_size {
        Some(size) if size != config.intermediate_size() => anyhow::bail!(
            "Unsupported intermediate_size {}: expected 4 x hidden_size = {}",
            size,
            config.intermediate_size()
        ),
        _ => {}
    }

    config.validate()?;

    info!("Model configuration loaded:");
    info!("   • Embedding size: {}", config.embedding_size);
    info!("   • Layers: {}", config.n_layers);
    info!("   • Attention heads: {}", config.n_heads);
    info!("   • Vocabulary size: {}", config.vocab_size);
    info!("   • Max tokens: {}", config.max_tokens);
    info!("");

    Ok(config)
}
