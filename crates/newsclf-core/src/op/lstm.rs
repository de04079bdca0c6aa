use ndarray::{s, Array1, Array2, ArrayView1, Axis};

use crate::base::error::{Error, Result};
use crate::op::activation::sigmoid;
use crate::op::Activations;

/// 单方向 LSTM 的权重，门的排列顺序为 Keras 的 i, f, c, o。
#[derive(Debug, Clone)]
pub struct LstmCell {
    /// `[in, 4 * units]`
    pub kernel: Array2<f32>,
    /// `[units, 4 * units]`
    pub recurrent_kernel: Array2<f32>,
    /// `[4 * units]`
    pub bias: Array1<f32>,
}

impl LstmCell {
    pub fn new(kernel: Array2<f32>, recurrent_kernel: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        let gates = kernel.ncols();
        if gates == 0 || gates % 4 != 0 {
            return Err(Error::InvalidArgument(format!(
                "LSTM kernel width {} is not a positive multiple of 4",
                gates
            ))
            .into());
        }
        let units = gates / 4;
        if recurrent_kernel.dim() != (units, gates) {
            return Err(Error::ShapeMismatch {
                context: "lstm recurrent_kernel".into(),
                expected: vec![units, gates],
                actual: recurrent_kernel.shape().to_vec(),
            }
            .into());
        }
        if bias.len() != gates {
            return Err(Error::ShapeMismatch {
                context: "lstm bias".into(),
                expected: vec![gates],
                actual: vec![bias.len()],
            }
            .into());
        }
        Ok(Self { kernel, recurrent_kernel, bias })
    }

    pub fn units(&self) -> usize {
        self.kernel.ncols() / 4
    }

    pub fn in_features(&self) -> usize {
        self.kernel.nrows()
    }

    fn step(&self, x: ArrayView1<f32>, h: &mut Array1<f32>, c: &mut Array1<f32>) {
        let u = self.units();
        let z = x.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;

        let i = z.slice(s![0..u]).mapv(sigmoid);
        let f = z.slice(s![u..2 * u]).mapv(sigmoid);
        let g = z.slice(s![2 * u..3 * u]).mapv(f32::tanh);
        let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);

        *c = &f * &*c + &i * &g;
        *h = &o * &c.mapv(f32::tanh);
    }

    /// 运行整条序列，返回每一步的输出 `[steps, units]`（已按时间顺序排列）和最终隐状态。
    ///
    /// 被 mask 掉的步不更新状态；输出沿用上一步，`zero_masked_output` 时写 0。
    fn run(
        &self,
        values: &Array2<f32>,
        mask: Option<&[bool]>,
        reverse: bool,
        zero_masked_output: bool,
    ) -> (Array2<f32>, Array1<f32>) {
        let steps = values.nrows();
        let u = self.units();
        let mut h = Array1::<f32>::zeros(u);
        let mut c = Array1::<f32>::zeros(u);
        let mut outputs = Array2::<f32>::zeros((steps, u));

        let order: Box<dyn Iterator<Item = usize>> = if reverse {
            Box::new((0..steps).rev())
        } else {
            Box::new(0..steps)
        };

        for t in order {
            let active = mask.map_or(true, |m| m[t]);
            if active {
                self.step(values.row(t), &mut h, &mut c);
                outputs.row_mut(t).assign(&h);
            } else if !zero_masked_output {
                outputs.row_mut(t).assign(&h);
            }
        }

        (outputs, h)
    }
}

/// LSTM 层，可选双向（输出拼接为 `[forward, backward]`）。
#[derive(Debug, Clone)]
pub struct Lstm {
    pub forward: LstmCell,
    pub backward: Option<LstmCell>,
    pub return_sequences: bool,
}

impl Lstm {
    pub fn output_features(&self) -> usize {
        self.forward.units() + self.backward.as_ref().map_or(0, LstmCell::units)
    }

    pub fn forward(&self, input: Activations) -> Result<Activations> {
        let Activations::Sequence { values, mask } = input else {
            return Err(Error::InvalidArgument("LSTM expects a sequence input".into()).into());
        };

        if values.ncols() != self.forward.in_features() {
            return Err(Error::ShapeMismatch {
                context: "lstm input".into(),
                expected: vec![values.nrows(), self.forward.in_features()],
                actual: values.shape().to_vec(),
            }
            .into());
        }

        // Keras 的 Bidirectional 在 return_sequences 时把被 mask 的输出置 0
        let zero_masked = self.backward.is_some() && self.return_sequences;
        let (fwd_seq, fwd_last) = self.forward.run(&values, mask.as_deref(), false, zero_masked);

        let (seq, last) = match &self.backward {
            None => (fwd_seq, fwd_last),
            Some(cell) => {
                let (bwd_seq, bwd_last) = cell.run(&values, mask.as_deref(), true, zero_masked);
                let seq = ndarray::concatenate(Axis(1), &[fwd_seq.view(), bwd_seq.view()])
                    .map_err(|e| Error::InvalidArgument(e.to_string()))?;
                let last = ndarray::concatenate(Axis(0), &[fwd_last.view(), bwd_last.view()])
                    .map_err(|e| Error::InvalidArgument(e.to_string()))?;
                (seq, last)
            }
        };

        if self.return_sequences {
            Ok(Activations::Sequence { values: seq, mask })
        } else {
            Ok(Activations::Vector(last))
        }
    }
}
