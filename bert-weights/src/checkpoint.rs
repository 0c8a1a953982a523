use anyhow::Context;
use bert_model::{BertModel, Tensor};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::{debug, info, warn};
use memmap2::Mmap;
use rayon::prelude::*;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};
use std::{
    collections::HashMap,
    fs::File,
    mem,
    path::Path,
};

use crate::error::{LoadError, Result};

/// Tensors read from a safetensors file.
#[derive(Debug, Default)]
pub struct Checkpoint {
    /// F32 and BF16 tensors, converted to f32
    pub tensors: HashMap<String, Tensor>,
    /// Names and dtypes of tensors that were skipped, e.g. I64 `position_ids` buffers
    pub unsupported: Vec<(String, String)>,
}

enum Entry {
    Converted(String, Tensor),
    Unsupported(String, String),
}

/// Reads every tensor of a safetensors checkpoint, converting from BF16/F32 to F32.
///
/// Tensors of any other dtype are skipped with a warning and listed in
/// [`Checkpoint::unsupported`]; a float tensor whose byte size does not match
/// its shape fails the whole read.
pub fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let file = File::open(path).map_err(|source| LoadError::Cache { path: path.to_path_buf(), source })?;

    // SAFETY: All file-backed memory map constructors are marked `unsafe` because of the potential for
    // *Undefined Behavior* (UB) using the map if the underlying file is subsequently modified, in or
    // out of process. Cached checkpoints are only ever replaced by rename, never modified in place.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| LoadError::Cache { path: path.to_path_buf(), source })?;

    let safetensors = SafeTensors::deserialize(&mmap).map_err(|err| LoadError::Deserialize {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let entries = safetensors
        .names()
        .into_par_iter()
        .map(|name| {
            let view = safetensors.tensor(name).map_err(|err| LoadError::Deserialize {
                path: path.to_path_buf(),
                message: format!("{name}: {err}"),
            })?;
            let entry = match convert_tensor_to_f32(&view, name)
                .map_err(|message| LoadError::Deserialize { path: path.to_path_buf(), message })?
            {
                Some(data) => Entry::Converted(name.clone(), Tensor { shape: view.shape().to_vec(), data }),
                None => Entry::Unsupported(name.clone(), format!("{:?}", view.dtype())),
            };
            Ok(entry)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut checkpoint = Checkpoint::default();
    for entry in entries {
        match entry {
            Entry::Converted(name, tensor) => {
                checkpoint.tensors.insert(name, tensor);
            }
            Entry::Unsupported(name, dtype) => {
                warn!("Skipping checkpoint tensor {name}: unsupported dtype {dtype}");
                checkpoint.unsupported.push((name, dtype));
            }
        }
    }
    checkpoint.unsupported.sort();

    debug!("Read {} tensors from {}", checkpoint.tensors.len(), path.display());
    Ok(checkpoint)
}

/// Convert tensor data to f32 based on its data type, `None` for dtypes that are not floats we read
fn convert_tensor_to_f32(
    tensor_view: &TensorView,
    tensor_name: &str,
) -> std::result::Result<Option<Vec<f32>>, String> {
    let tensor_data = tensor_view.data();
    let expected_elements = tensor_view.shape().iter().product::<usize>();

    match tensor_view.dtype() {
        Dtype::F32 => {
            validate_tensor_size(tensor_data.len(), expected_elements * mem::size_of::<f32>(), tensor_name, "F32")?;
            let mut values = vec![0.0f32; expected_elements];
            LittleEndian::read_f32_into(tensor_data, &mut values);
            Ok(Some(values))
        }
        Dtype::BF16 => {
            validate_tensor_size(tensor_data.len(), expected_elements * 2, tensor_name, "BF16")?;
            Ok(Some(convert_bf16_data(tensor_data)))
        }
        _ => Ok(None),
    }
}

/// Validate tensor data size matches expected size
fn validate_tensor_size(
    actual_bytes: usize,
    expected_bytes: usize,
    tensor_name: &str,
    dtype_name: &str,
) -> std::result::Result<(), String> {
    if actual_bytes != expected_bytes {
        return Err(format!(
            "{dtype_name} tensor {tensor_name} size mismatch. Expected {expected_bytes} bytes, got {actual_bytes}"
        ));
    }
    Ok(())
}

/// Convert BF16 tensor data to F32
fn convert_bf16_data(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(2)
        .map(|chunk| {
            // BF16 to F32: BF16 is the upper 16 bits of F32
            let bf16_bits = LittleEndian::read_u16(chunk);
            f32::from_bits(u32::from(bf16_bits) << 16)
        })
        .collect()
}

/// Writes named tensors as an F32 safetensors file.
pub fn write_checkpoint<'a>(
    tensors: impl IntoIterator<Item = (&'a str, &'a Tensor)>,
    output_path: &Path,
) -> anyhow::Result<()> {
    let encoded = tensors
        .into_iter()
        .map(|(name, tensor)| {
            let mut bytes = Vec::with_capacity(tensor.numel() * mem::size_of::<f32>());
            tensor.data.iter().try_for_each(|&value| bytes.write_f32::<LittleEndian>(value))?;
            Ok((name.to_string(), tensor.shape.clone(), bytes))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let views = encoded
        .iter()
        .map(|(name, shape, bytes)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.clone(), view))
                .map_err(|err| anyhow::anyhow!("Invalid tensor {name}: {err}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let metadata = Some(HashMap::from([("format".to_string(), "pt".to_string())]));
    safetensors::serialize_to_file(views, &metadata, output_path)
        .with_context(|| format!("Failed to write checkpoint {}", output_path.display()))?;

    Ok(())
}

/// Saves every parameter of `model` under its internal name.
pub fn save_checkpoint(model: &BertModel, output_path: &Path) -> anyhow::Result<()> {
    write_checkpoint(model.parameters().iter(), output_path)?;
    info!("💾 Written {} parameters to {}", model.parameters().len(), output_path.display());
    Ok(())
}
