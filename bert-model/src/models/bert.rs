use crate::{configuration::BertConfig, layers::*, parameters::ParameterStore};
use anyhow::{Context, Result};
use log::debug;

use super::{BertOutput, EncoderInput};

/// BERT encoder: embeddings followed by a stack of post-norm transformer blocks.
pub struct BertModel {
    config: BertConfig,
    embeddings: BertEmbeddings,
    blocks: Vec<BertEncoderBlock>,
    params: ParameterStore,
}

impl BertModel {
    /// Builds an encoder for `config` with freshly allocated parameters.
    ///
    /// Layer-norm scales start at one, every other parameter at zero, so the
    /// model is only meaningful once pretrained weights are assigned.
    pub fn new(config: BertConfig) -> Result<Self> {
        config.validate().context("Invalid BERT configuration")?;

        let embeddings = BertEmbeddings::new(&config);
        let blocks = (0..config.n_layers)
            .map(|layer_idx| BertEncoderBlock::new(&config, layer_idx))
            .collect::<Vec<_>>();

        let mut params = ParameterStore::new();
        embeddings.declare(&mut params)?;
        for block in &blocks {
            block.declare(&mut params)?;
        }
        debug!("Allocated {} parameter tensors, {} values", params.len(), params.num_elements());

        Ok(Self { config, embeddings, blocks, params })
    }

    /// Forward pass over a single tokenized sequence
    ///
    /// **Process Flow:**
    /// 1. **Embeddings**: token + position + token-type lookups, then layer norm
    /// 2. **Encoder Blocks**: self-attention and feed-forward, each with residual + layer norm
    ///
    /// **Returns:**
    /// - Embeddings before the first block, the hidden states after every block and
    ///   the attention probabilities of every block
    pub fn forward(&self, input: &EncoderInput) -> Result<BertOutput> {
        input.validate(&self.config)?;

        let mut x = self.embeddings.forward(&self.params, input)?;
        let initial_embeddings = x.clone();

        let mut layer_outputs = Vec::with_capacity(self.blocks.len());
        let mut attention_weights = Vec::with_capacity(self.blocks.len());

        for block in &self.blocks {
            let weights = block
                .forward(&self.params, &mut x, &input.attention_mask)
                .with_context(|| format!("Encoder block {} failed", block.layer_idx))?;
            layer_outputs.push(x.clone());
            attention_weights.push(weights);
        }

        Ok(BertOutput {
            seq_len: input.len(),
            embedding_size: self.config.embedding_size,
            n_heads: self.config.n_heads,
            initial_embeddings,
            layer_outputs,
            attention_weights,
        })
    }

    pub fn config(&self) -> &BertConfig {
        &self.config
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }
}

impl std::fmt::Debug for BertModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        struct BlocksSummary<'a, T>(&'a [T]);

        impl<'a, T: std::fmt::Debug> std::fmt::Debug for BlocksSummary<'a, T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_list()
                    .entries(self.0.iter().take(1))
                    .entry(&format_args!("... and {} more", self.0.len().saturating_sub(1)))
                    .finish()
            }
        }

        f.debug_struct("BertModel")
            .field("config", &self.config)
            .field("embeddings", &self.embeddings)
            .field("blocks", &BlocksSummary(&self.blocks))
            .field("params", &self.params)
            .finish()
    }
}

/// Word, position and token-type embeddings summed and normalized.
#[derive(Debug)]
struct BertEmbeddings {
    word: Embedding,
    position: Embedding,
    token_type: Embedding,
    layer_norm: LayerNorm,
}

impl BertEmbeddings {
    fn new(config: &BertConfig) -> Self {
        let dim = config.embedding_size;
        Self {
            word: Embedding::new("embeddings.word_embeddings", config.vocab_size, dim),
            position: Embedding::new("embeddings.position_embeddings", config.max_tokens, dim),
            token_type: Embedding::new("embeddings.token_type_embeddings", config.token_type_vocab_size, dim),
            layer_norm: LayerNorm::new("embeddings.layer_norm", dim, config.layer_norm_eps),
        }
    }

    fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        self.word.declare(params)?;
        self.position.declare(params)?;
        self.token_type.declare(params)?;
        self.layer_norm.declare(params)
    }

    fn forward(&self, params: &ParameterStore, input: &EncoderInput) -> Result<Vec<f32>> {
        let positions = (0..input.len()).collect::<Vec<_>>();
        let mut x = vec![0.0; input.len() * self.word.dim];

        self.word.forward_add(params, &input.token_ids, &mut x)?;
        self.position.forward_add(params, &positions, &mut x)?;
        self.token_type.forward_add(params, &input.token_type_ids, &mut x)?;
        self.layer_norm.forward_inplace(params, &mut x)?;

        Ok(x)
    }
}

/// Encoder Block - self-attention and feed-forward, each followed by residual + layer norm
struct BertEncoderBlock {
    attention: MultiHeadAttention,
    attention_norm: LayerNorm,
    feed_forward: FeedForward,
    output_norm: LayerNorm,
    layer_idx: usize,
}

impl BertEncoderBlock {
    fn new(config: &BertConfig, layer_idx: usize) -> Self {
        let prefix = format!("encoder.layer.{layer_idx}");
        let dim = config.embedding_size;
        Self {
            attention: MultiHeadAttention::new(&format!("{prefix}.attention"), dim, config.n_heads),
            attention_norm: LayerNorm::new(&format!("{prefix}.attention.output.layer_norm"), dim, config.layer_norm_eps),
            feed_forward: FeedForward::new(&prefix, dim, config.intermediate_size()),
            output_norm: LayerNorm::new(&format!("{prefix}.output.layer_norm"), dim, config.layer_norm_eps),
            layer_idx,
        }
    }

    fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        self.attention.declare(params)?;
        self.attention_norm.declare(params)?;
        self.feed_forward.declare(params)?;
        self.output_norm.declare(params)
    }

    /// Updates `x` in place and returns the attention probabilities.
    fn forward(&self, params: &ParameterStore, x: &mut [f32], mask: &[bool]) -> Result<Vec<f32>> {
        let attention = self.attention.forward(params, x, mask)?;

        // Residual connection
        x.iter_mut().zip(attention.hidden.iter()).for_each(|(x_val, &delta)| *x_val += delta);
        self.attention_norm.forward_inplace(params, x)?;

        let ffn_out = self.feed_forward.forward(params, x)?;

        // Residual connection
        x.iter_mut().zip(ffn_out.iter()).for_each(|(x_val, &delta)| *x_val += delta);
        self.output_norm.forward_inplace(params, x)?;

        Ok(attention.weights)
    }
}

impl std::fmt::Debug for BertEncoderBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEncoderBlock")
            .field("layer_idx", &self.layer_idx)
            .field("attention", &self.attention)
            .field("attention_norm", &self.attention_norm)
            .field("feed_forward", &self.feed_forward)
            .field("output_norm", &self.output_norm)
            .finish()
    }
}
