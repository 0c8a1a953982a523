use super::*;
use anyhow::Result;

fn create_test_model() -> Result<BertModel> {
    Ok(BertModel::new(BertConfig::new(8, 1, 2, 16, 20))?)
}

/// Every parameter of `model` filled with `value`, under its internal name.
fn full_checkpoint(model: &BertModel, value: f32) -> HashMap<String, Tensor> {
    model
        .parameters()
        .iter()
        .map(|(name, tensor)| (name.to_string(), Tensor::full(&tensor.shape, value)))
        .collect()
}

#[test]
fn test_assign_full_checkpoint() -> Result<()> {
    let mut model = create_test_model()?;
    let tensors = full_checkpoint(&model, 0.5);
    let expected = tensors.len();

    let report = assign_checkpoint(&mut model, tensors)?;

    assert_eq!(report.loaded, expected);
    assert!(report.is_complete());
    assert!(report.unused_checkpoint.is_empty());
    for (name, tensor) in model.parameters().iter() {
        assert!(tensor.data.iter().all(|&v| v == 0.5), "{name} was not assigned");
    }
    Ok(())
}

#[test]
fn test_unmatched_names_are_reported() -> Result<()> {
    let mut model = create_test_model()?;
    let mut tensors = full_checkpoint(&model, 1.0);
    tensors.remove("embeddings.token_type_embeddings.weight");
    tensors.insert("pooler.dense.bias".to_string(), Tensor::zeros(&[8]));

    let report = assign_checkpoint(&mut model, tensors)?;

    assert!(!report.is_complete());
    assert_eq!(report.missing_parameters, vec!["embeddings.token_type_embeddings.weight"]);
    assert_eq!(report.unused_checkpoint, vec!["pooler.dense.bias"]);
    assert_eq!(report.loaded, model.parameters().len() - 1);

    // the missing parameter keeps its constructor value
    let token_types = model.parameters().require("embeddings.token_type_embeddings.weight")?;
    assert!(token_types.data.iter().all(|&v| v == 0.0));
    Ok(())
}

#[test]
fn test_shape_mismatch_leaves_model_unchanged() -> Result<()> {
    let mut model = create_test_model()?;
    let before = model.parameters().iter().map(|(name, tensor)| (name.to_string(), tensor.clone())).collect::<Vec<_>>();

    let mut tensors = full_checkpoint(&model, 3.0);
    // sorts last among the encoder names, so earlier names would already be staged
    tensors.insert("encoder.layer.0.output.layer_norm.weight".to_string(), Tensor::full(&[9], 1.0));

    let err = assign_checkpoint(&mut model, tensors).unwrap_err();

    match err {
        LoadError::ShapeMismatch { name, expected, actual } => {
            assert_eq!(name, "encoder.layer.0.output.layer_norm.weight");
            assert_eq!(expected, vec![8]);
            assert_eq!(actual, vec![9]);
        }
        other => panic!("unexpected error: {other}"),
    }
    for (name, tensor) in before {
        assert_eq!(model.parameters().get(&name), Some(&tensor), "{name} changed");
    }
    Ok(())
}

#[test]
fn test_renamed_pretrained_names_match_parameters() -> Result<()> {
    let model = create_test_model()?;

    for name in [
        "bert.embeddings.LayerNorm.gamma",
        "bert.embeddings.LayerNorm.beta",
        "bert.embeddings.word_embeddings.weight",
        "bert.encoder.layer.0.attention.output.LayerNorm.gamma",
        "bert.encoder.layer.0.attention.self.value.bias",
        "bert.encoder.layer.0.output.LayerNorm.beta",
    ] {
        let renamed = rename_variable(name, RENAME_RULES);
        assert!(model.parameters().contains(&renamed), "{name} -> {renamed}");
    }
    Ok(())
}

#[test]
fn test_empty_checkpoint_loads_nothing() -> Result<()> {
    let mut model = create_test_model()?;

    let report = assign_checkpoint(&mut model, HashMap::new())?;

    assert_eq!(report.loaded, 0);
    assert_eq!(report.missing_parameters.len(), model.parameters().len());
    Ok(())
}
