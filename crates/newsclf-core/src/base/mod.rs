pub mod error;

/// 权重文件中允许出现的数据类型，加载时统一转换为 f32。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    F32,
    F16,
    BF16,
}

impl DataType {
    /// 返回数据类型的字节大小。
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F16 => 2,
            DataType::BF16 => 2,
        }
    }
}

impl TryFrom<safetensors::Dtype> for DataType {
    type Error = error::Error;

    fn try_from(dtype: safetensors::Dtype) -> Result<Self, Self::Error> {
        match dtype {
            safetensors::Dtype::F32 => Ok(DataType::F32),
            safetensors::Dtype::F16 => Ok(DataType::F16),
            safetensors::Dtype::BF16 => Ok(DataType::BF16),
            other => Err(error::Error::Unimplemented(format!(
                "Unsupported weight dtype {:?}, expected F32, F16 or BF16",
                other
            ))),
        }
    }
}
