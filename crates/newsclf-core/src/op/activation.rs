use ndarray::ArrayViewMut1;
use serde::{Deserialize, Serialize};

/// Dense 层支持的激活函数，名称与 Keras 配置一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    /// 原地应用激活函数
    pub fn apply(&self, mut x: ArrayViewMut1<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Relu => x.mapv_inplace(|v| v.max(0.0)),
            Activation::Sigmoid => x.mapv_inplace(sigmoid),
            Activation::Tanh => x.mapv_inplace(f32::tanh),
            Activation::Softmax => softmax_inplace(x),
        }
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// 数值稳定的 softmax：先减去最大值
pub fn softmax_inplace(mut x: ArrayViewMut1<f32>) {
    let max = x.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    x.mapv_inplace(|v| (v - max).exp());
    let sum = x.sum();
    if sum > 0.0 {
        x.mapv_inplace(|v| v / sum);
    }
}
