use super::*;
use anyhow::Result;
use std::fs;
use tempfile::TempDir;

const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "the", "cat", "sat", "play", "##ing", "##ed", ",", ".", "cafe", "un",
    "##aff", "##able", "osaka", "中", "国",
];

fn create_tokenizer() -> Tokenizer {
    Tokenizer::from_tokens(VOCAB.iter().map(|t| t.to_string()).collect(), true).unwrap()
}

fn id(token: &str) -> usize {
    VOCAB.iter().position(|&t| t == token).unwrap()
}

#[test]
fn test_tokenize_splits_punctuation_and_subwords() {
    let tokenizer = create_tokenizer();

    let ids = tokenizer.tokenize("The cat, playing.").unwrap();

    assert_eq!(ids, vec![id("the"), id("cat"), id(","), id("play"), id("##ing"), id(".")]);
}

#[test]
fn test_tokenize_greedy_longest_match() {
    let tokenizer = create_tokenizer();

    assert_eq!(tokenizer.tokenize("unaffable").unwrap(), vec![id("un"), id("##aff"), id("##able")]);
}

#[test]
fn test_uncoverable_word_is_unknown() {
    let tokenizer = create_tokenizer();

    assert_eq!(tokenizer.tokenize("dog").unwrap(), vec![id("[UNK]")]);
    assert_eq!(tokenizer.tokenize(&"a".repeat(MAX_WORD_CHARS + 1)).unwrap(), vec![id("[UNK]")]);
}

#[test]
fn test_lowercase_strips_accents() {
    let tokenizer = create_tokenizer();

    assert_eq!(tokenizer.tokenize("CAFÉ").unwrap(), vec![id("cafe")]);
    // macron decomposes under NFD like any other combining mark
    assert_eq!(tokenizer.tokenize("Ōsaka").unwrap(), vec![id("osaka")]);
}

#[test]
fn test_cased_keeps_accents_and_case() -> Result<()> {
    let tokenizer = Tokenizer::from_tokens(VOCAB.iter().map(|t| t.to_string()).collect(), false)?;

    assert_eq!(tokenizer.tokenize("Cafe")?, vec![id("[UNK]")]);
    assert_eq!(tokenizer.tokenize("cafe")?, vec![id("cafe")]);
    Ok(())
}

#[test]
fn test_cjk_characters_are_split() -> Result<()> {
    let tokenizer = create_tokenizer();

    assert_eq!(tokenizer.tokenize("中国")?, vec![id("中"), id("国")]);
    assert_eq!(tokenizer.tokenize("the中cat")?, vec![id("the"), id("中"), id("cat")]);
    Ok(())
}

#[test]
fn test_encode_pads_to_length() -> Result<()> {
    let tokenizer = create_tokenizer();

    let input = tokenizer.encode("the cat sat", 8)?;

    assert_eq!(
        input.token_ids,
        vec![id("[CLS]"), id("the"), id("cat"), id("sat"), id("[SEP]"), id("[PAD]"), id("[PAD]"), id("[PAD]")]
    );
    assert_eq!(input.attention_mask, vec![true, true, true, true, true, false, false, false]);
    assert!(input.token_type_ids.iter().all(|&t| t == 0));
    Ok(())
}

#[test]
fn test_encode_truncates_keeping_sep() -> Result<()> {
    let tokenizer = create_tokenizer();

    let input = tokenizer.encode("the cat sat", 4)?;

    assert_eq!(input.token_ids, vec![id("[CLS]"), id("the"), id("cat"), id("[SEP]")]);
    assert!(input.attention_mask.iter().all(|&m| m));
    assert!(tokenizer.encode("the", 1).is_err());
    Ok(())
}

#[test]
fn test_encode_pair_sets_token_types() -> Result<()> {
    let tokenizer = create_tokenizer();

    let input = tokenizer.encode_pair("the cat", "sat", 7)?;

    assert_eq!(
        input.token_ids,
        vec![id("[CLS]"), id("the"), id("cat"), id("[SEP]"), id("sat"), id("[SEP]"), id("[PAD]")]
    );
    assert_eq!(input.token_type_ids, vec![0, 0, 0, 0, 1, 1, 0]);
    assert_eq!(input.attention_mask, vec![true, true, true, true, true, true, false]);
    Ok(())
}

#[test]
fn test_encode_pair_trims_longer_segment() -> Result<()> {
    let tokenizer = create_tokenizer();

    let input = tokenizer.encode_pair("the cat sat", "cat", 6)?;

    assert_eq!(input.token_ids, vec![id("[CLS]"), id("the"), id("cat"), id("[SEP]"), id("cat"), id("[SEP]")]);
    Ok(())
}

#[test]
fn test_from_file_reads_vocab() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("vocab.txt");
    fs::write(&path, VOCAB.join("\n"))?;

    let tokenizer = Tokenizer::from_file(&path, true)?;

    assert_eq!(tokenizer.vocab_size(), VOCAB.len());
    assert_eq!(tokenizer.id_to_token(id("##ing")).as_deref(), Some("##ing"));
    assert_eq!(tokenizer.tokenize("the sat")?, vec![id("the"), id("sat")]);
    Ok(())
}

#[test]
fn test_missing_special_token_is_error() {
    let result = Tokenizer::from_tokens(vec!["[PAD]".to_string(), "hello".to_string()], true);

    assert!(result.is_err());
}
