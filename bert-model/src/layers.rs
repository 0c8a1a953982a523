use crate::parameters::ParameterStore;
use crate::tensor::{Tensor, dot, linear};
use anyhow::Result;
use rayon::prelude::*;

/// Additive score for padded key positions; small enough that softmax maps it to zero.
const MASKED_SCORE: f32 = -1e9;

/// Lookup table layer - maps discrete ids to dense vectors
///
/// **Shape**: [num_embeddings, dim]
pub struct Embedding {
    pub weight: String,
    pub num_embeddings: usize,
    pub dim: usize,
}

impl Embedding {
    pub fn new(prefix: &str, num_embeddings: usize, dim: usize) -> Self {
        Self { weight: format!("{prefix}.weight"), num_embeddings, dim }
    }

    pub fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        params.register(&self.weight, Tensor::zeros(&[self.num_embeddings, self.dim]))
    }

    /// Adds the embedding of every id to the matching row of `output`.
    pub fn forward_add(&self, params: &ParameterStore, ids: &[usize], output: &mut [f32]) -> Result<()> {
        let table = params.require(&self.weight)?;

        for (row, &id) in output.chunks_exact_mut(self.dim).zip(ids) {
            if id >= self.num_embeddings {
                anyhow::bail!("Id {} is out of range for '{}' with {} entries", id, self.weight, self.num_embeddings);
            }
            row.iter_mut().zip(table.row(id)).for_each(|(out, &value)| *out += value);
        }

        Ok(())
    }
}

impl std::fmt::Debug for Embedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedding")
            .field("num_embeddings", &self.num_embeddings)
            .field("dim", &self.dim)
            .finish()
    }
}

/// Layer Normalization with learned scale and shift
///
/// **Mathematical Formula**:
/// ```text
/// LayerNorm(x) = (x - mean(x)) / sqrt(var(x) + ε) * γ + β
/// ```
pub struct LayerNorm {
    pub weight: String,
    pub bias: String,
    pub dim: usize,
    pub eps: f32,
}

impl LayerNorm {
    pub fn new(prefix: &str, dim: usize, eps: f32) -> Self {
        Self { weight: format!("{prefix}.weight"), bias: format!("{prefix}.bias"), dim, eps }
    }

    pub fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        params.register(&self.weight, Tensor::full(&[self.dim], 1.0))?;
        params.register(&self.bias, Tensor::zeros(&[self.dim]))
    }

    /// Normalizes every row of `x` in place.
    pub fn forward_inplace(&self, params: &ParameterStore, x: &mut [f32]) -> Result<()> {
        let gamma = &params.require(&self.weight)?.data;
        let beta = &params.require(&self.bias)?.data;

        x.par_chunks_mut(self.dim).for_each(|row| {
            let mean = row.iter().sum::<f32>() / self.dim as f32;
            let variance = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / self.dim as f32;
            let inv_std = (variance + self.eps).sqrt().recip();

            row.iter_mut().zip(gamma.iter()).zip(beta.iter()).for_each(|((val, &g), &b)| {
                *val = (*val - mean) * inv_std * g + b;
            });
        });

        Ok(())
    }
}

impl std::fmt::Debug for LayerNorm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerNorm").field("dim", &self.dim).field("eps", &self.eps).finish()
    }
}

/// Fully connected layer, weights stored as [out_features, in_features]
pub struct Linear {
    pub weight: String,
    pub bias: String,
    pub in_features: usize,
    pub out_features: usize,
}

impl Linear {
    pub fn new(prefix: &str, in_features: usize, out_features: usize) -> Self {
        Self { weight: format!("{prefix}.weight"), bias: format!("{prefix}.bias"), in_features, out_features }
    }

    pub fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        params.register(&self.weight, Tensor::zeros(&[self.out_features, self.in_features]))?;
        params.register(&self.bias, Tensor::zeros(&[self.out_features]))
    }

    /// Projects `seq_len` rows of `input`, returning a `[seq_len, out_features]` buffer.
    pub fn forward(&self, params: &ParameterStore, input: &[f32]) -> Result<Vec<f32>> {
        let weight = params.require(&self.weight)?;
        let bias = params.require(&self.bias)?;
        let rows = input.len() / self.in_features;

        let mut output = vec![0.0; rows * self.out_features];
        linear(&mut output, input, &weight.data, Some(&bias.data), self.in_features, self.out_features);
        Ok(output)
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .finish()
    }
}

/// Bidirectional multi-head self-attention
///
/// **Attention Formula**:
/// ```text
/// Attention(Q,K,V) = softmax(QK^T / √d_k + mask)V
/// ```
/// Padded key positions receive a large negative score so every query only
/// attends to real tokens.
pub struct MultiHeadAttention {
    pub query: Linear,
    pub key: Linear,
    pub value: Linear,
    pub output: Linear,
    pub n_heads: usize,
    pub head_dim: usize,
}

/// Result of one attention pass.
pub struct AttentionOutput {
    /// Projected context, [seq_len, dim]
    pub hidden: Vec<f32>,
    /// Attention probabilities, [n_heads, seq_len, seq_len]
    pub weights: Vec<f32>,
}

impl MultiHeadAttention {
    pub fn new(prefix: &str, dim: usize, n_heads: usize) -> Self {
        Self {
            query: Linear::new(&format!("{prefix}.self.query"), dim, dim),
            key: Linear::new(&format!("{prefix}.self.key"), dim, dim),
            value: Linear::new(&format!("{prefix}.self.value"), dim, dim),
            output: Linear::new(&format!("{prefix}.output.dense"), dim, dim),
            n_heads,
            head_dim: dim / n_heads,
        }
    }

    pub fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        self.query.declare(params)?;
        self.key.declare(params)?;
        self.value.declare(params)?;
        self.output.declare(params)
    }

    pub fn forward(&self, params: &ParameterStore, x: &[f32], mask: &[bool]) -> Result<AttentionOutput> {
        let seq_len = mask.len();
        let dim = self.n_heads * self.head_dim;

        let q = self.query.forward(params, x)?;
        let k = self.key.forward(params, x)?;
        let v = self.value.forward(params, x)?;

        let scale = (self.head_dim as f32).sqrt().recip();
        let mut weights = vec![0.0; self.n_heads * seq_len * seq_len];
        let mut context = vec![0.0; seq_len * dim];

        // Each head writes its own [seq_len, seq_len] block of probabilities
        let head_contexts: Vec<Vec<f32>> = weights
            .par_chunks_mut(seq_len * seq_len)
            .enumerate()
            .map(|(head_idx, att)| {
                let offset = head_idx * self.head_dim;
                let head = |buf: &[f32], pos: usize| -> Vec<f32> {
                    buf[pos * dim + offset..pos * dim + offset + self.head_dim].to_vec()
                };

                let mut head_context = vec![0.0; seq_len * self.head_dim];
                for (query_pos, att_row) in att.chunks_exact_mut(seq_len).enumerate() {
                    let q_vec = head(&q, query_pos);

                    att_row.iter_mut().enumerate().for_each(|(key_pos, score)| {
                        *score = if mask[key_pos] {
                            dot(&q_vec, &head(&k, key_pos)) * scale
                        } else {
                            MASKED_SCORE
                        };
                    });

                    softmax(att_row);

                    let out = &mut head_context[query_pos * self.head_dim..(query_pos + 1) * self.head_dim];
                    for (key_pos, &prob) in att_row.iter().enumerate() {
                        let v_start = key_pos * dim + offset;
                        out.iter_mut()
                            .zip(&v[v_start..v_start + self.head_dim])
                            .for_each(|(o, &value)| *o += prob * value);
                    }
                }
                head_context
            })
            .collect();

        for (head_idx, head_context) in head_contexts.iter().enumerate() {
            let offset = head_idx * self.head_dim;
            for (pos, values) in head_context.chunks_exact(self.head_dim).enumerate() {
                context[pos * dim + offset..pos * dim + offset + self.head_dim].copy_from_slice(values);
            }
        }

        let hidden = self.output.forward(params, &context)?;
        Ok(AttentionOutput { hidden, weights })
    }
}

impl std::fmt::Debug for MultiHeadAttention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiHeadAttention")
            .field("n_heads", &self.n_heads)
            .field("head_dim", &self.head_dim)
            .field("query", &self.query)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("output", &self.output)
            .finish()
    }
}

/// Position-wise feed-forward network with GELU activation
///
/// **Architecture**: dim -> 4 * dim -> dim
pub struct FeedForward {
    pub intermediate: Linear,
    pub output: Linear,
}

impl FeedForward {
    pub fn new(prefix: &str, dim: usize, hidden_dim: usize) -> Self {
        Self {
            intermediate: Linear::new(&format!("{prefix}.intermediate.dense"), dim, hidden_dim),
            output: Linear::new(&format!("{prefix}.output.dense"), hidden_dim, dim),
        }
    }

    pub fn declare(&self, params: &mut ParameterStore) -> Result<()> {
        self.intermediate.declare(params)?;
        self.output.declare(params)
    }

    pub fn forward(&self, params: &ParameterStore, x: &[f32]) -> Result<Vec<f32>> {
        let mut hidden = self.intermediate.forward(params, x)?;
        hidden.par_iter_mut().for_each(|val| *val = gelu(*val));
        self.output.forward(params, &hidden)
    }
}

impl std::fmt::Debug for FeedForward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedForward")
            .field("hidden_dim", &self.intermediate.out_features)
            .field("intermediate", &self.intermediate)
            .field("output", &self.output)
            .finish()
    }
}

// Applies softmax normalization to a slice in-place.
pub(crate) fn softmax(x: &mut [f32]) {
    let max_val = x.iter().fold(f32::NEG_INFINITY, |acc, &val| acc.max(val));
    let sum = x
        .iter_mut()
        .map(|val| {
            *val = (*val - max_val).exp();
            *val
        })
        .sum::<f32>();
    let inv_sum = sum.recip();
    x.iter_mut().for_each(|val| *val *= inv_sum);
}

/// Exact (erf based) GELU as used by BERT.
pub(crate) fn gelu(x: f32) -> f32 {
    0.5 * x * (1.0 + erf(x * std::f32::consts::FRAC_1_SQRT_2))
}

// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f32) -> f32 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let x = f64::from(x);
    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    (sign * y) as f32
}
