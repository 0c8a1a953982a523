//! WordPiece tokenizer for BERT vocabularies.
//!
//! Wraps the HuggingFace tokenizers library with the standard BERT pipeline:
//! - `BertNormalizer`: control-character cleanup, CJK splitting, optional lowercasing with NFD accent stripping.
//! - `BertPreTokenizer`: whitespace and punctuation splitting.
//! - `WordPiece`: longest-match-first subwords, continuation pieces prefixed with `##`.
//! - `BertProcessing`: `[CLS]`/`[SEP]` wrapping and token-type ids.
//!
//! Sequences are truncated and padded to a fixed number of tokens for the encoder.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tokenizers::models::wordpiece::{WordPiece, WordPieceBuilder};
use tokenizers::normalizers::{BertNormalizer, NormalizerWrapper};
use tokenizers::pre_tokenizers::{PreTokenizerWrapper, bert::BertPreTokenizer};
use tokenizers::processors::{PostProcessorWrapper, bert::BertProcessing};
use tokenizers::{Encoding, Tokenizer as HfTokenizer, TruncationDirection};

use crate::models::EncoderInput;

const CLS_TOKEN: &str = "[CLS]";
const SEP_TOKEN: &str = "[SEP]";
const PAD_TOKEN: &str = "[PAD]";
const UNK_TOKEN: &str = "[UNK]";
const CONTINUATION_PREFIX: &str = "##";
/// Words longer than this map straight to `[UNK]`.
const MAX_WORD_CHARS: usize = 100;

pub struct Tokenizer {
    /// Underlying HuggingFace tokenizer
    inner: HfTokenizer,
    lowercase: bool,
    pad_id: usize,
}

impl Tokenizer {
    /// Reads a `vocab.txt` from disk, one token per line, id = line index.
    pub fn from_file(vocab_path: &Path, lowercase: bool) -> Result<Self> {
        let path = vocab_path
            .to_str()
            .with_context(|| format!("Vocabulary path is not valid UTF-8: {}", vocab_path.display()))?;

        Self::with_model(WordPiece::from_file(path), lowercase)
            .with_context(|| format!("Failed to read vocabulary {}", vocab_path.display()))
    }

    /// Builds a tokenizer from tokens listed in id order.
    pub fn from_tokens(tokens: Vec<String>, lowercase: bool) -> Result<Self> {
        let vocab = tokens
            .into_iter()
            .enumerate()
            .map(|(id, token)| (token, id as u32))
            .collect::<HashMap<_, _>>();

        Self::with_model(WordPiece::builder().vocab(vocab), lowercase)
    }

    fn with_model(builder: WordPieceBuilder, lowercase: bool) -> Result<Self> {
        let wordpiece = builder
            .unk_token(UNK_TOKEN.to_string())
            .continuing_subword_prefix(CONTINUATION_PREFIX.to_string())
            .max_input_chars_per_word(MAX_WORD_CHARS)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build WordPiece model: {e}"))?;

        let mut inner = HfTokenizer::new(wordpiece);

        let special = |token: &str| {
            inner
                .token_to_id(token)
                .ok_or_else(|| anyhow::anyhow!("Vocabulary is missing special token {token}"))
        };
        let cls_id = special(CLS_TOKEN)?;
        let sep_id = special(SEP_TOKEN)?;
        let pad_id = special(PAD_TOKEN)?;
        special(UNK_TOKEN)?;

        inner
            .with_normalizer(NormalizerWrapper::from(BertNormalizer::new(true, true, None, lowercase)))
            .with_pre_tokenizer(PreTokenizerWrapper::from(BertPreTokenizer))
            .with_post_processor(PostProcessorWrapper::from(BertProcessing::new(
                (SEP_TOKEN.to_string(), sep_id),
                (CLS_TOKEN.to_string(), cls_id),
            )));

        Ok(Self { inner, lowercase, pad_id: pad_id as usize })
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    pub fn id_to_token(&self, id: usize) -> Option<String> {
        u32::try_from(id).ok().and_then(|id| self.inner.id_to_token(id))
    }

    /// Splits text into WordPiece ids without special tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<usize>> {
        Ok(to_usize(self.encode_segment(text)?.get_ids()))
    }

    /// Encodes one segment as `[CLS] text [SEP]`, padded or truncated to `n_tokens`.
    pub fn encode(&self, text: &str, n_tokens: usize) -> Result<EncoderInput> {
        if n_tokens < 2 {
            anyhow::bail!("n_tokens must leave room for [CLS] and [SEP], got {n_tokens}");
        }

        let mut encoding = self.encode_segment(text)?;
        encoding.truncate(n_tokens - 2, 0, TruncationDirection::Right);

        self.finish(encoding, None, n_tokens)
    }

    /// Encodes two segments as `[CLS] a [SEP] b [SEP]`, trimming the longer one first.
    pub fn encode_pair(&self, first: &str, second: &str, n_tokens: usize) -> Result<EncoderInput> {
        if n_tokens < 3 {
            anyhow::bail!("n_tokens must leave room for [CLS] and two [SEP], got {n_tokens}");
        }

        let mut a = self.encode_segment(first)?;
        let mut b = self.encode_segment(second)?;

        let (mut a_len, mut b_len) = (a.len(), b.len());
        while a_len + b_len > n_tokens - 3 {
            if a_len >= b_len {
                a_len -= 1;
            } else {
                b_len -= 1;
            }
        }
        a.truncate(a_len, 0, TruncationDirection::Right);
        b.truncate(b_len, 0, TruncationDirection::Right);

        self.finish(a, Some(b), n_tokens)
    }

    fn encode_segment(&self, text: &str) -> Result<Encoding> {
        self.inner
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Failed to encode text: {e}"))
    }

    /// Adds the special tokens, then pads to `n_tokens`.
    fn finish(&self, encoding: Encoding, pair: Option<Encoding>, n_tokens: usize) -> Result<EncoderInput> {
        let encoding = self
            .inner
            .post_process(encoding, pair, true)
            .map_err(|e| anyhow::anyhow!("Failed to add special tokens: {e}"))?;

        Ok(self.pad(to_usize(encoding.get_ids()), to_usize(encoding.get_type_ids()), n_tokens))
    }

    fn pad(&self, mut token_ids: Vec<usize>, mut token_type_ids: Vec<usize>, n_tokens: usize) -> EncoderInput {
        let real = token_ids.len();
        token_ids.resize(n_tokens, self.pad_id);
        token_type_ids.resize(n_tokens, 0);
        let attention_mask = (0..n_tokens).map(|i| i < real).collect();

        EncoderInput { token_ids, token_type_ids, attention_mask }
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("vocab_size", &self.vocab_size())
            .field("lowercase", &self.lowercase)
            .finish()
    }
}

fn to_usize(ids: &[u32]) -> Vec<usize> {
    ids.iter().map(|&id| id as usize).collect()
}

#[cfg(test)]
#[path = "../tests/unit/tokenizer_test.rs"]
mod tokenizer_test;
