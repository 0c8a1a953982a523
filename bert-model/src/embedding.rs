//! Sentence embeddings on top of encoder outputs.
//!
//! A single encoder instance acts as the shared "spine" for any number of
//! inputs: anchor, positive and negative sentences all go through the same
//! weights, and the pooled vectors are compared with cosine similarity or
//! scored with a triplet margin loss.

use anyhow::Result;

use crate::models::{BertOutput, Encoder, EncoderInput};

/// How token states are reduced to one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// Hidden state of the first ([CLS]) token
    Cls,
    /// Mean over unmasked tokens
    #[default]
    Mean,
}

impl TryFrom<&str> for Pooling {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "cls" => Ok(Self::Cls),
            "mean" => Ok(Self::Mean),
            _ => anyhow::bail!("Unknown pooling: {value}"),
        }
    }
}

/// Hidden state of the first token.
pub fn cls_pool(output: &BertOutput) -> Vec<f32> {
    output.last_hidden_state()[..output.embedding_size].to_vec()
}

/// Average of the hidden states whose mask entry is set.
pub fn mean_pool(output: &BertOutput, attention_mask: &[bool]) -> Vec<f32> {
    let dim = output.embedding_size;
    let mut pooled = vec![0.0; dim];
    let mut count = 0usize;

    for (row, _) in output
        .last_hidden_state()
        .chunks_exact(dim)
        .zip(attention_mask)
        .filter(|&(_, &keep)| keep)
    {
        pooled.iter_mut().zip(row).for_each(|(acc, &value)| *acc += value);
        count += 1;
    }

    if count > 0 {
        let inv = (count as f32).recip();
        pooled.iter_mut().for_each(|v| *v *= inv);
    }
    pooled
}

/// Encodes `input` and pools the final hidden states.
pub fn embed<E: Encoder + ?Sized>(encoder: &E, input: &EncoderInput, pooling: Pooling) -> Result<Vec<f32>> {
    let output = encoder.forward(input)?;
    Ok(match pooling {
        Pooling::Cls => cls_pool(&output),
        Pooling::Mean => mean_pool(&output, &input.attention_mask),
    })
}

/// Cosine similarity; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Margin ranking loss over distances: `max(d(a, p) - d(a, n) + margin, 0)`.
pub fn triplet_margin_loss(anchor: &[f32], positive: &[f32], negative: &[f32], margin: f32) -> f32 {
    (euclidean_distance(anchor, positive) - euclidean_distance(anchor, negative) + margin).max(0.0)
}

/// Scores of one anchor/positive/negative triple through a shared encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct TripletScore {
    pub positive_similarity: f32,
    pub negative_similarity: f32,
    pub loss: f32,
}

/// Runs all three inputs through the same encoder and scores them.
pub fn score_triplet<E: Encoder + ?Sized>(
    encoder: &E,
    anchor: &EncoderInput,
    positive: &EncoderInput,
    negative: &EncoderInput,
    pooling: Pooling,
    margin: f32,
) -> Result<TripletScore> {
    let anchor = embed(encoder, anchor, pooling)?;
    let positive = embed(encoder, positive, pooling)?;
    let negative = embed(encoder, negative, pooling)?;

    Ok(TripletScore {
        positive_similarity: cosine_similarity(&anchor, &positive),
        negative_similarity: cosine_similarity(&anchor, &negative),
        loss: triplet_margin_loss(&anchor, &positive, &negative, margin),
    })
}
