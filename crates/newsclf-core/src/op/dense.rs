use ndarray::{Array1, Array2, Axis};

use crate::base::error::{Error, Result};
use crate::op::activation::Activation;
use crate::op::Activations;

/// 全连接层: `y = activation(x · W + b)`，`W` 的形状为 Keras 约定的 `[in, out]`。
#[derive(Debug, Clone)]
pub struct Dense {
    pub kernel: Array2<f32>,
    pub bias: Option<Array1<f32>>,
    pub activation: Activation,
}

impl Dense {
    pub fn new(kernel: Array2<f32>, bias: Option<Array1<f32>>, activation: Activation) -> Result<Self> {
        if let Some(bias) = &bias {
            if bias.len() != kernel.ncols() {
                return Err(Error::ShapeMismatch {
                    context: "dense bias".into(),
                    expected: vec![kernel.ncols()],
                    actual: vec![bias.len()],
                }
                .into());
            }
        }
        Ok(Self { kernel, bias, activation })
    }

    pub fn in_features(&self) -> usize {
        self.kernel.nrows()
    }

    /// 对向量或序列的每一步做全连接；序列输入时 mask 原样向后传递。
    pub fn forward(&self, input: Activations) -> Result<Activations> {
        match input {
            Activations::Vector(x) => {
                self.check_features(x.len())?;
                let mut y = x.dot(&self.kernel);
                self.finish_row(y.view_mut());
                Ok(Activations::Vector(y))
            }
            Activations::Sequence { values, mask } => {
                self.check_features(values.ncols())?;
                let mut y = values.dot(&self.kernel);
                for row in y.axis_iter_mut(Axis(0)) {
                    self.finish_row(row);
                }
                Ok(Activations::Sequence { values: y, mask })
            }
        }
    }

    fn finish_row(&self, mut row: ndarray::ArrayViewMut1<f32>) {
        if let Some(bias) = &self.bias {
            row += bias;
        }
        self.activation.apply(row);
    }

    fn check_features(&self, actual: usize) -> Result<()> {
        if actual != self.in_features() {
            return Err(Error::ShapeMismatch {
                context: "dense input".into(),
                expected: vec![self.in_features()],
                actual: vec![actual],
            }
            .into());
        }
        Ok(())
    }
}
