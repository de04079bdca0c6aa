//! CPU 算子
//!
//! 每个算子只处理单条序列：输入 `[steps, features]` 或 `[features]`，
//! 不做 batch 维度。所有权重在加载时已转换为 f32。

pub mod activation;
pub mod dense;
pub mod embedding;
pub mod lstm;
pub mod pad;
pub mod pooling;

use ndarray::{Array1, Array2};

/// 层与层之间传递的激活值
#[derive(Debug, Clone)]
pub enum Activations {
    /// 时间序列特征 `[steps, features]`，可选的逐步 mask（true 表示有效）
    Sequence {
        values: Array2<f32>,
        mask: Option<Vec<bool>>,
    },
    /// 单个特征向量 `[features]`
    Vector(Array1<f32>),
}

impl Activations {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Activations::Sequence { values, .. } => values.shape().to_vec(),
            Activations::Vector(v) => vec![v.len()],
        }
    }
}
