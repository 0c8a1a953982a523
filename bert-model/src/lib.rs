//! # bert-model
//!
//! Pure Rust BERT encoder: configuration record, named parameter store,
//! layer primitives, forward pass, WordPiece tokenization and pooled
//! sentence embeddings.
//!
//! ```rust,no_run
//! use bert_model::{BertConfig, BertModel, EncoderInput};
//!
//! # fn main() -> anyhow::Result<()> {
//! let model = BertModel::new(BertConfig::new(128, 2, 2, 512, 30522))?;
//! let output = model.forward(&EncoderInput::from_token_ids(vec![101, 7592, 102]))?;
//! assert_eq!(output.layer_outputs.len(), 2);
//! # Ok(())
//! # }
//! ```

mod configuration;
pub mod embedding;
mod layers;
mod models;
mod parameters;
mod tensor;
mod tokenizer;

pub use configuration::{BertConfig, LAYER_NORM_EPS, TOKEN_TYPE_VOCAB_SIZE};
pub use embedding::{Pooling, TripletScore};
pub use models::{BertModel, BertOutput, Encoder, EncoderInput};
pub use parameters::ParameterStore;
pub use tensor::Tensor;
pub use tokenizer::Tokenizer;

#[cfg(test)]
#[path = "../tests/unit/bert_test.rs"]
mod bert_test;
