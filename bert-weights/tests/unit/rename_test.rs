use super::*;

fn rename(name: &str) -> String {
    rename_variable(name, RENAME_RULES)
}

#[test]
fn test_gamma_beta_become_weight_bias() {
    assert_eq!(rename("bert.embeddings.LayerNorm.gamma"), "embeddings.layer_norm.weight");
    assert_eq!(
        rename("bert.encoder.layer.3.output.LayerNorm.beta"),
        "encoder.layer.3.output.layer_norm.bias"
    );
}

#[test]
fn test_gamma_replaced_at_every_occurrence() {
    assert_eq!(rename("x.gamma.y.gamma"), "x.weight.y.weight");
}

#[test]
fn test_bert_prefix_removed_everywhere() {
    // the rule is a plain substring replacement, not a prefix strip
    assert_eq!(rename("bert.encoder.bert.layer"), "encoder.layer");
    assert_eq!(rename("distilbert.embeddings.word_embeddings.weight"), "distilembeddings.word_embeddings.weight");
    assert_eq!(rename("cls.bert.x"), "cls.x");
    // "bert" not followed by a dot is left alone
    assert_eq!(rename("roberta.embeddings.word_embeddings.weight"), "roberta.embeddings.word_embeddings.weight");
}

#[test]
fn test_already_internal_names_are_unchanged() {
    for name in [
        "embeddings.word_embeddings.weight",
        "encoder.layer.0.attention.self.query.bias",
        "encoder.layer.11.intermediate.dense.weight",
    ] {
        assert_eq!(rename(name), name);
    }
}

#[test]
fn test_rules_apply_in_order() {
    let rules = [RenameRule::new("ab", "b"), RenameRule::new("bb", "c")];

    assert_eq!(rename_variable("abb", &rules), "c");
    assert_eq!(rename_variable("abb", &[rules[1], rules[0]]), "ac");
}

#[test]
fn test_rename_checkpoint_maps_every_key() {
    let tensors = HashMap::from([
        ("bert.pooler.dense.weight".to_string(), 1),
        ("bert.embeddings.LayerNorm.gamma".to_string(), 2),
        ("cls.predictions.bias".to_string(), 3),
    ]);

    let renamed = rename_checkpoint(tensors, RENAME_RULES);

    assert_eq!(renamed.len(), 3);
    assert_eq!(renamed["pooler.dense.weight"], 1);
    assert_eq!(renamed["embeddings.layer_norm.weight"], 2);
    assert_eq!(renamed["cls.predictions.bias"], 3);
}

#[test]
fn test_rename_checkpoint_collision_keeps_later_key() {
    let tensors = HashMap::from([
        ("bert.embeddings.LayerNorm.weight".to_string(), 1),
        ("embeddings.LayerNorm.gamma".to_string(), 2),
    ]);

    let renamed = rename_checkpoint(tensors, RENAME_RULES);

    assert_eq!(renamed.len(), 1);
    // "embeddings..." sorts after "bert..."
    assert_eq!(renamed["embeddings.layer_norm.weight"], 2);
}
