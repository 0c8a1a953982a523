use super::*;
use anyhow::Result;

fn create_test_config() -> BertConfig {
    BertConfig::new(8, 2, 2, 16, 20)
}

/// Fills every parameter with small deterministic values.
fn randomize(model: &mut BertModel) -> Result<()> {
    let shapes = model
        .parameters()
        .iter()
        .map(|(name, tensor)| (name.to_string(), tensor.shape.clone()))
        .collect::<Vec<_>>();

    let mut seed = 42u64;
    for (name, shape) in shapes {
        let numel = shape.iter().product::<usize>();
        let data = (0..numel)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((seed >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 0.2
            })
            .collect();
        model.parameters_mut().assign(&name, Tensor::from_vec(shape, data)?)?;
    }
    Ok(())
}

#[test]
fn test_constructor_declares_every_parameter() -> Result<()> {
    let model = BertModel::new(create_test_config())?;
    let params = model.parameters();

    // 5 embedding tensors + 16 per layer
    assert_eq!(params.len(), 5 + 2 * 16);
    assert_eq!(params.shape("embeddings.word_embeddings.weight"), Some(&[20, 8][..]));
    assert_eq!(params.shape("embeddings.position_embeddings.weight"), Some(&[16, 8][..]));
    assert_eq!(params.shape("embeddings.token_type_embeddings.weight"), Some(&[2, 8][..]));
    assert_eq!(params.shape("encoder.layer.1.attention.self.query.weight"), Some(&[8, 8][..]));
    assert_eq!(params.shape("encoder.layer.1.attention.output.layer_norm.bias"), Some(&[8][..]));
    assert_eq!(params.shape("encoder.layer.0.intermediate.dense.weight"), Some(&[32, 8][..]));
    assert_eq!(params.shape("encoder.layer.0.output.dense.weight"), Some(&[8, 32][..]));
    assert!(!params.contains("encoder.layer.2.output.dense.weight"));
    assert!(!params.contains("pooler.dense.weight"));
    Ok(())
}

#[test]
fn test_layer_norm_weights_start_at_one() -> Result<()> {
    let model = BertModel::new(create_test_config())?;

    let weight = model.parameters().require("embeddings.layer_norm.weight")?;
    assert!(weight.data.iter().all(|&v| v == 1.0));
    let bias = model.parameters().require("embeddings.layer_norm.bias")?;
    assert!(bias.data.iter().all(|&v| v == 0.0));
    Ok(())
}

#[test]
fn test_constructor_rejects_invalid_config() {
    let result = BertModel::new(BertConfig::new(10, 2, 3, 16, 20));

    assert!(result.is_err());
}

#[test]
fn test_forward_output_shapes() -> Result<()> {
    let mut model = BertModel::new(create_test_config())?;
    randomize(&mut model)?;

    let input = EncoderInput::from_token_ids(vec![2, 5, 7, 9, 3]);
    let output = model.forward(&input)?;

    assert_eq!(output.seq_len, 5);
    assert_eq!(output.initial_embeddings.len(), 5 * 8);
    assert_eq!(output.layer_outputs.len(), 2);
    assert!(output.layer_outputs.iter().all(|layer| layer.len() == 5 * 8));
    assert_eq!(output.attention_weights.len(), 2);
    assert!(output.attention_weights.iter().all(|att| att.len() == 2 * 5 * 5));
    assert!(output.last_hidden_state().iter().all(|v| v.is_finite()));

    Ok(())
}

#[test]
fn test_attention_ignores_padding() -> Result<()> {
    let mut model = BertModel::new(create_test_config())?;
    randomize(&mut model)?;

    let input = EncoderInput {
        token_ids: vec![2, 5, 3, 0, 0],
        token_type_ids: vec![0; 5],
        attention_mask: vec![true, true, true, false, false],
    };
    let output = model.forward(&input)?;

    for att in &output.attention_weights {
        for row in att.chunks_exact(5) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
            assert_eq!(row[3], 0.0);
            assert_eq!(row[4], 0.0);
        }
    }
    Ok(())
}

#[test]
fn test_padding_does_not_change_real_tokens() -> Result<()> {
    let mut model = BertModel::new(create_test_config())?;
    randomize(&mut model)?;

    let short = model.forward(&EncoderInput::from_token_ids(vec![2, 5, 3]))?;
    let padded = model.forward(&EncoderInput {
        token_ids: vec![2, 5, 3, 0],
        token_type_ids: vec![0; 4],
        attention_mask: vec![true, true, true, false],
    })?;

    for (a, b) in short.last_hidden_state().iter().zip(&padded.last_hidden_state()[..3 * 8]) {
        assert!((a - b).abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn test_untrained_attention_is_uniform() -> Result<()> {
    let model = BertModel::new(create_test_config())?;

    let output = model.forward(&EncoderInput::from_token_ids(vec![1, 2, 3, 4]))?;

    assert!(output.attention_weights[0].iter().all(|&p| (p - 0.25).abs() < 1e-6));
    Ok(())
}

#[test]
fn test_forward_rejects_invalid_input() -> Result<()> {
    let model = BertModel::new(create_test_config())?;

    assert!(model.forward(&EncoderInput::from_token_ids(vec![])).is_err());
    assert!(model.forward(&EncoderInput::from_token_ids(vec![1; 17])).is_err());
    assert!(model.forward(&EncoderInput::from_token_ids(vec![1, 20])).is_err());

    let mismatched = EncoderInput { token_ids: vec![1, 2], token_type_ids: vec![0], attention_mask: vec![true, true] };
    assert!(model.forward(&mismatched).is_err());

    let bad_segment = EncoderInput { token_ids: vec![1, 2], token_type_ids: vec![0, 2], attention_mask: vec![true; 2] };
    assert!(model.forward(&bad_segment).is_err());
    Ok(())
}

#[test]
fn test_shared_encoder_scores_triplet() -> Result<()> {
    let mut model = BertModel::new(create_test_config())?;
    randomize(&mut model)?;

    let anchor = EncoderInput::from_token_ids(vec![2, 5, 6, 3]);
    let score = embedding::score_triplet(&model, &anchor, &anchor, &anchor, Pooling::Mean, 0.5)?;

    assert!((score.positive_similarity - 1.0).abs() < 1e-5);
    assert_eq!(score.positive_similarity, score.negative_similarity);
    assert!((score.loss - 0.5).abs() < 1e-5);
    Ok(())
}
