use anyhow::Result;
use rayon::prelude::*;

/// Dense row-major f32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor of the given shape filled with `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self { shape: shape.to_vec(), data: vec![value; shape.iter().product()] }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Wraps existing data, checking that it matches the declared shape.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            anyhow::bail!("Tensor data has {} elements, shape {:?} needs {}", data.len(), shape, expected);
        }
        Ok(Self { shape, data })
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns row `idx` of a 2-D tensor.
    pub fn row(&self, idx: usize) -> &[f32] {
        let cols = self.shape.last().copied().unwrap_or(0);
        &self.data[idx * cols..(idx + 1) * cols]
    }
}

/// Computes `xout = x · wᵀ + b` for every row of `x`.
///
/// # Arguments
/// * `xout` - Output buffer of shape `[rows, d]`
/// * `x` - Input buffer of shape `[rows, n]`
/// * `w` - Weight buffer in `[d, n]` layout (out features first)
/// * `b` - Optional bias of length `d`
pub fn linear(xout: &mut [f32], x: &[f32], w: &[f32], b: Option<&[f32]>, n: usize, d: usize) {
    debug_assert_eq!(x.len() % n, 0, "input length must be a multiple of n");
    debug_assert_eq!(w.len(), n * d, "weight must be [d, n]");
    assert!(xout.len() >= (x.len() / n) * d, "Output slice too small: {} < {}", xout.len(), (x.len() / n) * d);

    xout.par_chunks_mut(d).zip(x.par_chunks(n)).for_each(|(out_row, in_row)| {
        for (i, out_val) in out_row.iter_mut().enumerate() {
            let w_row = &w[i * n..(i + 1) * n];
            let dot = in_row.iter().zip(w_row).map(|(&a, &b)| a * b).sum::<f32>();
            *out_val = dot + b.map_or(0.0, |bias| bias[i]);
        }
    });
}

/// Dot product of two equally sized slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}
