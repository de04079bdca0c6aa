use ndarray::Array2;

use crate::base::error::{Error, Result};
use crate::op::Activations;

/// Embedding 算子，根据输入的 token ID 从权重矩阵中查找嵌入向量。
#[derive(Debug, Clone)]
pub struct Embedding {
    /// 权重矩阵 (查询表), 形状为 [vocab_size, dim]。
    pub weight: Array2<f32>,
    /// 为 true 时下标 0 视为填充，并向后续层传递 mask
    pub mask_zero: bool,
}

impl Embedding {
    pub fn new(weight: Array2<f32>, mask_zero: bool) -> Self {
        Self { weight, mask_zero }
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.nrows()
    }

    pub fn dim(&self) -> usize {
        self.weight.ncols()
    }

    /// 输入 1D 的 token ID，输出 `[token_len, dim]`。
    pub fn forward(&self, ids: &[u32]) -> Result<Activations> {
        let vocab_size = self.vocab_size();
        let mut values = Array2::<f32>::zeros((ids.len(), self.dim()));

        for (row, &id) in ids.iter().enumerate() {
            let id = id as usize;
            if id >= vocab_size {
                return Err(Error::IndexOutOfBounds(format!(
                    "token id {} at position {} exceeds embedding table of size {}",
                    id, row, vocab_size
                ))
                .into());
            }
            values.row_mut(row).assign(&self.weight.row(id));
        }

        let mask = self
            .mask_zero
            .then(|| ids.iter().map(|&id| id != 0).collect());

        Ok(Activations::Sequence { values, mask })
    }
}
