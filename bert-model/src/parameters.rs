//! Named parameter dictionary owned by a model.
//!
//! Every learned tensor of an encoder lives here under its internal variable
//! name. Layers only hold names and look their tensors up at forward time, so
//! loading pretrained weights is a matter of replacing entries in this store.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::tensor::Tensor;

#[derive(Clone, Default)]
pub struct ParameterStore {
    tensors: BTreeMap<String, Tensor>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new parameter. Names must be unique.
    pub fn register(&mut self, name: impl Into<String>, tensor: Tensor) -> Result<()> {
        let name = name.into();
        if self.tensors.contains_key(&name) {
            anyhow::bail!("Parameter '{name}' is already registered");
        }
        self.tensors.insert(name, tensor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Looks up a parameter that the architecture requires.
    pub fn require(&self, name: &str) -> Result<&Tensor> {
        self.tensors.get(name).ok_or_else(|| anyhow::anyhow!("Missing parameter: {name}"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.tensors.get(name).map(|tensor| tensor.shape.as_slice())
    }

    /// Replaces the values of an existing parameter, requiring an exact shape match.
    pub fn assign(&mut self, name: &str, tensor: Tensor) -> Result<()> {
        let current = self
            .tensors
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown parameter: {name}"))?;

        if current.shape != tensor.shape {
            anyhow::bail!(
                "Shape mismatch for '{}': expected {:?}, got {:?}",
                name,
                current.shape,
                tensor.shape
            );
        }

        *current = tensor;
        Ok(())
    }

    /// Parameter names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(name, tensor)| (name.as_str(), tensor))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalar values across all parameters.
    pub fn num_elements(&self) -> usize {
        self.tensors.values().map(Tensor::numel).sum()
    }
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("parameters", &self.tensors.len())
            .field("elements", &self.num_elements())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_requires_matching_shape() {
        let mut store = ParameterStore::new();
        store.register("a.weight", Tensor::zeros(&[2, 3])).unwrap();

        let err = store.assign("a.weight", Tensor::zeros(&[3, 2])).unwrap_err();
        assert_eq!(err.to_string(), "Shape mismatch for 'a.weight': expected [2, 3], got [3, 2]");

        store.assign("a.weight", Tensor::full(&[2, 3], 1.5)).unwrap();
        assert!(store.require("a.weight").unwrap().data.iter().all(|&v| v == 1.5));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut store = ParameterStore::new();
        store.register("bias", Tensor::zeros(&[4])).unwrap();
        assert!(store.register("bias", Tensor::zeros(&[4])).is_err());
        assert!(store.assign("missing", Tensor::zeros(&[4])).is_err());
        assert_eq!(store.num_elements(), 4);
    }
}
