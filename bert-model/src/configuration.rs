use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Epsilon used by BERT layer normalization.
pub const LAYER_NORM_EPS: f32 = 1e-12;
/// Number of segment (token type) embeddings in BERT checkpoints.
pub const TOKEN_TYPE_VOCAB_SIZE: usize = 2;
/// Feed-forward expansion factor relative to the embedding size.
const INTERMEDIATE_MULTIPLIER: usize = 4;

/// Architecture hyperparameters of a BERT encoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BertConfig {
    pub embedding_size: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub max_tokens: usize,
    pub vocab_size: usize,
    #[serde(default = "default_token_type_vocab_size")]
    pub token_type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f32,
}

fn default_token_type_vocab_size() -> usize {
    TOKEN_TYPE_VOCAB_SIZE
}

fn default_layer_norm_eps() -> f32 {
    LAYER_NORM_EPS
}

impl BertConfig {
    pub const fn new(embedding_size: usize, n_layers: usize, n_heads: usize, max_tokens: usize, vocab_size: usize) -> Self {
        Self {
            embedding_size,
            n_layers,
            n_heads,
            max_tokens,
            vocab_size,
            token_type_vocab_size: TOKEN_TYPE_VOCAB_SIZE,
            layer_norm_eps: LAYER_NORM_EPS,
        }
    }

    /// Width of the feed-forward block, always four times the embedding size.
    pub const fn intermediate_size(&self) -> usize {
        INTERMEDIATE_MULTIPLIER * self.embedding_size
    }

    pub const fn head_dim(&self) -> usize {
        self.embedding_size / self.n_heads
    }

    /// Checks that every dimension is usable for building an encoder.
    pub fn validate(&self) -> Result<()> {
        let dimensions = [
            ("embedding_size", self.embedding_size),
            ("n_layers", self.n_layers),
            ("n_heads", self.n_heads),
            ("max_tokens", self.max_tokens),
            ("vocab_size", self.vocab_size),
            ("token_type_vocab_size", self.token_type_vocab_size),
        ];

        for (name, value) in dimensions {
            if value == 0 {
                anyhow::bail!("Invalid {}: must be positive, got {}", name, value);
            }
        }

        if self.embedding_size % self.n_heads != 0 {
            anyhow::bail!(
                "Invalid embedding_size: {} is not divisible by n_heads {}",
                self.embedding_size,
                self.n_heads
            );
        }

        if !(self.layer_norm_eps > 0.0) {
            anyhow::bail!("Invalid layer_norm_eps: must be positive, got {}", self.layer_norm_eps);
        }

        Ok(())
    }
}
