use super::*;

#[test]
fn test_every_entry_is_a_valid_config() {
    for entry in CATALOG {
        let config = entry.config;
        assert!(config.validate().is_ok(), "{} is invalid", entry.name);
        assert_eq!(config.intermediate_size(), 4 * config.embedding_size);
        assert_eq!(config.max_tokens, 512);
    }
}

#[test]
fn test_bert_tiny_uncased() -> anyhow::Result<()> {
    let config = config_bert("bert_tiny_uncased")?;

    assert_eq!(config.embedding_size, 128);
    assert_eq!(config.n_layers, 2);
    assert_eq!(config.n_heads, 2);
    assert_eq!(config.max_tokens, 512);
    assert_eq!(config.vocab_size, 30522);
    Ok(())
}

#[test]
fn test_cased_vocabulary() -> anyhow::Result<()> {
    assert_eq!(config_bert("bert_base_cased")?.vocab_size, 28996);
    assert!(!model_source("bert_base_cased")?.lowercase);
    assert!(model_source("bert_base_uncased")?.lowercase);
    Ok(())
}

#[test]
fn test_available_berts_in_catalog_order() {
    let names = available_berts();

    assert_eq!(names.len(), 7);
    assert_eq!(names[0], "bert_tiny_uncased");
    assert_eq!(names[6], "bert_large_uncased");
}

#[test]
fn test_catalog_entries_match_config_lookup() -> anyhow::Result<()> {
    let entries = catalog();

    assert_eq!(entries.len(), available_berts().len());
    for entry in entries {
        assert_eq!(config_bert(entry.name)?, entry.config);
    }
    Ok(())
}

#[test]
fn test_every_entry_has_a_source() {
    for name in available_berts() {
        let source = model_source(name).unwrap_or_else(|err| panic!("{name}: {err}"));
        assert!(source.weights_url.ends_with(".safetensors"));
        assert!(source.vocab_url.ends_with("vocab.txt"));
    }
    assert_eq!(SOURCES.len(), CATALOG.len());
}

#[test]
fn test_unknown_name_lists_available_models() {
    let err = config_bert("bert_huge").unwrap_err();

    match &err {
        LoadError::UnknownModel { name, available } => {
            assert_eq!(name, "bert_huge");
            assert!(available.contains("bert_tiny_uncased"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(model_source("bert_huge"), Err(LoadError::UnknownModel { .. })));
}
