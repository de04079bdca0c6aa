use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use half::{bf16, f16};
use memmap2::MmapOptions;
use ndarray::{Array1, Array2};
use safetensors::tensor::TensorView;
use safetensors::SafeTensors;

use crate::base::error::{Error, Result};
use crate::base::DataType;

pub struct SafetensorReader<'a> {
    tensors: SafeTensors<'a>,
}

impl<'a> SafetensorReader<'a> {
    /// 从一个已经映射到内存的缓冲区创建 Reader
    pub fn new(buffer: &'a [u8]) -> Result<Self> {
        let tensors = SafeTensors::deserialize(buffer)
            .map_err(|e| Error::InvalidArgument(format!("Failed to deserialize safetensors: {}", e)))?;

        Ok(Self { tensors })
    }

    /// 根据名称获取一个张量视图
    pub fn get_tensor(&self, name: &str) -> Result<TensorView<'a>> {
        self.tensors
            .tensor(name)
            .map_err(|e| Error::InvalidArgument(format!("Tensor '{}' not found in this file: {}", name, e)).into())
    }

    pub fn get_tensor_names(&self) -> Vec<String> {
        self.tensors.names().into_iter().map(|s| s.to_string()).collect()
    }
}

/// 辅助函数，用于内存映射文件
pub fn load_and_mmap(path: &Path) -> Result<memmap2::Mmap> {
    let file = File::open(path).map_err(Error::Io)?;
    // SAFETY: 权重文件在服务期间只读，不会被其他进程截断
    let buffer = unsafe { MmapOptions::new().map(&file).map_err(Error::Io)? };
    Ok(buffer)
}

/// 将小端字节流按 dtype 解码为 f32
pub fn decode_f32(dtype: DataType, bytes: &[u8]) -> Vec<f32> {
    let chunks = bytes.chunks_exact(dtype.size_in_bytes());
    match dtype {
        DataType::F32 => chunks
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        DataType::F16 => chunks.map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32()).collect(),
        DataType::BF16 => chunks.map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32()).collect(),
    }
}

/// 已解码为 f32 的单个权重
#[derive(Debug, Clone)]
pub struct Weight {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// 从 `model.safetensors` 读出的全部权重。构建层时按名称取走，
/// 剩余未使用的权重在加载结束时给出警告。
#[derive(Debug, Default)]
pub struct WeightMap {
    weights: HashMap<String, Weight>,
}

impl WeightMap {
    pub fn load(path: &Path) -> Result<Self> {
        let mmap = load_and_mmap(path)?;
        let reader = SafetensorReader::new(&mmap)?;

        let mut weights = HashMap::new();
        for name in reader.get_tensor_names() {
            let view = reader.get_tensor(&name)?;
            let dtype = DataType::try_from(view.dtype())?;
            let data = decode_f32(dtype, view.data());
            tracing::debug!("weight '{}' dtype={:?} shape={:?}", name, dtype, view.shape());
            weights.insert(name, Weight { shape: view.shape().to_vec(), data });
        }

        Ok(Self { weights })
    }

    pub fn from_weights(weights: HashMap<String, Weight>) -> Self {
        Self { weights }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn take(&mut self, name: &str) -> Result<Weight> {
        self.weights
            .remove(name)
            .ok_or_else(|| Error::InvalidArgument(format!("Weight '{}' not found in model.safetensors", name)).into())
    }

    pub fn take_array1(&mut self, name: &str) -> Result<Array1<f32>> {
        let weight = self.take(name)?;
        if weight.shape.len() != 1 {
            return Err(Error::ShapeMismatch {
                context: name.to_string(),
                expected: vec![weight.data.len()],
                actual: weight.shape,
            }
            .into());
        }
        Ok(Array1::from_vec(weight.data))
    }

    pub fn take_array2(&mut self, name: &str) -> Result<Array2<f32>> {
        let weight = self.take(name)?;
        if weight.shape.len() != 2 {
            return Err(Error::InvalidArgument(format!(
                "Weight '{}' must be 2D, got shape {:?}",
                name, weight.shape
            ))
            .into());
        }
        let shape = (weight.shape[0], weight.shape[1]);
        Array2::from_shape_vec(shape, weight.data)
            .map_err(|e| Error::InvalidArgument(format!("Weight '{}': {}", name, e)).into())
    }

    /// 加载结束后尚未被任何层取走的权重名
    pub fn remaining(&self) -> Vec<String> {
        let mut names: Vec<String> = self.weights.keys().cloned().collect();
        names.sort();
        names
    }
}
