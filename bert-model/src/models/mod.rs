use anyhow::Result;

use crate::configuration::BertConfig;

mod bert;

pub use bert::BertModel;

/// Contains the main inference logic of an encoder model.
pub trait Encoder {
    /// Runs forward pass over one tokenized sequence.
    fn forward(&self, input: &EncoderInput) -> Result<BertOutput>;

    fn get_config(&self) -> &BertConfig;
}

impl Encoder for BertModel {
    fn forward(&self, input: &EncoderInput) -> Result<BertOutput> {
        BertModel::forward(self, input)
    }

    fn get_config(&self) -> &BertConfig {
        self.config()
    }
}

/// One tokenized sequence ready for the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInput {
    pub token_ids: Vec<usize>,
    pub token_type_ids: Vec<usize>,
    /// `false` marks padding positions that must not be attended to
    pub attention_mask: Vec<bool>,
}

impl EncoderInput {
    /// Single segment input without padding.
    pub fn from_token_ids(token_ids: Vec<usize>) -> Self {
        let len = token_ids.len();
        Self { token_ids, token_type_ids: vec![0; len], attention_mask: vec![true; len] }
    }

    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    pub(crate) fn validate(&self, config: &BertConfig) -> Result<()> {
        if self.is_empty() {
            anyhow::bail!("Input sequence is empty");
        }
        if self.token_type_ids.len() != self.len() || self.attention_mask.len() != self.len() {
            anyhow::bail!(
                "Input length mismatch: {} token ids, {} token type ids, {} mask entries",
                self.len(),
                self.token_type_ids.len(),
                self.attention_mask.len()
            );
        }
        if self.len() > config.max_tokens {
            anyhow::bail!("Input has {} tokens, the model accepts at most {}", self.len(), config.max_tokens);
        }
        Ok(())
    }
}

/// Everything the encoder computes for one sequence.
#[derive(Debug, Clone)]
pub struct BertOutput {
    pub seq_len: usize,
    pub embedding_size: usize,
    pub n_heads: usize,
    /// Normalized embeddings before the first block, [seq_len, embedding_size]
    pub initial_embeddings: Vec<f32>,
    /// Hidden states after each block, n_layers × [seq_len, embedding_size]
    pub layer_outputs: Vec<Vec<f32>>,
    /// Attention probabilities of each block, n_layers × [n_heads, seq_len, seq_len]
    pub attention_weights: Vec<Vec<f32>>,
}

impl BertOutput {
    /// Hidden states of the final block.
    pub fn last_hidden_state(&self) -> &[f32] {
        self.layer_outputs.last().map_or(&self.initial_embeddings, Vec::as_slice)
    }
}
