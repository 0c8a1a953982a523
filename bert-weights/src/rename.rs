//! Checkpoint variable renaming.
//!
//! Pretrained BERT checkpoints name their tensors after the original
//! TensorFlow/PyTorch modules (`bert.` prefix, `LayerNorm`, `gamma`/`beta`).
//! The rules below rewrite those names into the internal parameter names of
//! [`bert_model::BertModel`]. Each rule is a literal substring replacement
//! applied to every occurrence, and rules run in the listed order.

use log::warn;
use std::collections::HashMap;

/// Replace every occurrence of `pattern` with `replacement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameRule {
    pub pattern: &'static str,
    pub replacement: &'static str,
}

impl RenameRule {
    pub const fn new(pattern: &'static str, replacement: &'static str) -> Self {
        Self { pattern, replacement }
    }
}

#[rustfmt::skip]
pub const RENAME_RULES: &[RenameRule] = &[
    RenameRule::new("bert.", ""),
    RenameRule::new("LayerNorm", "layer_norm"),
    RenameRule::new(".gamma", ".weight"),
    RenameRule::new(".beta", ".bias"),
];

/// Applies every rule, in order, to `name`.
pub fn rename_variable(name: &str, rules: &[RenameRule]) -> String {
    rules
        .iter()
        .fold(name.to_string(), |acc, rule| acc.replace(rule.pattern, rule.replacement))
}

/// Renames every key of a checkpoint dictionary.
///
/// Keys are processed in sorted order, so when two source names collapse onto
/// the same target the lexicographically later one wins.
pub fn rename_checkpoint<T>(tensors: HashMap<String, T>, rules: &[RenameRule]) -> HashMap<String, T> {
    let mut entries = tensors.into_iter().collect::<Vec<_>>();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut renamed = HashMap::with_capacity(entries.len());
    for (name, tensor) in entries {
        let new_name = rename_variable(&name, rules);
        if renamed.insert(new_name.clone(), tensor).is_some() {
            warn!("Checkpoint variable '{name}' overrides an earlier tensor renamed to '{new_name}'");
        }
    }
    renamed
}

#[cfg(test)]
#[path = "../tests/unit/rename_test.rs"]
mod rename_test;
