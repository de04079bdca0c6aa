use ndarray::{Array1, Axis};

use crate::base::error::{Error, Result};
use crate::op::Activations;

fn expect_sequence(input: Activations, op: &str) -> Result<(ndarray::Array2<f32>, Option<Vec<bool>>)> {
    match input {
        Activations::Sequence { values, mask } => Ok((values, mask)),
        Activations::Vector(_) => {
            Err(Error::InvalidArgument(format!("{} expects a sequence input", op)).into())
        }
    }
}

/// 按时间维求平均；有 mask 时只统计有效步，全部被 mask 时输出零向量。
pub fn global_average_pooling1d(input: Activations) -> Result<Activations> {
    let (values, mask) = expect_sequence(input, "GlobalAveragePooling1D")?;
    let features = values.ncols();

    let pooled = match mask {
        None => values
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features)),
        Some(mask) => {
            let mut sum = Array1::<f32>::zeros(features);
            let mut count = 0usize;
            for (row, _) in values.axis_iter(Axis(0)).zip(&mask).filter(|(_, m)| **m) {
                sum += &row;
                count += 1;
            }
            if count > 0 {
                sum / count as f32
            } else {
                sum
            }
        }
    };

    Ok(Activations::Vector(pooled))
}

/// 按时间维取最大值，忽略 mask
pub fn global_max_pooling1d(input: Activations) -> Result<Activations> {
    let (values, _) = expect_sequence(input, "GlobalMaxPooling1D")?;
    if values.nrows() == 0 {
        return Ok(Activations::Vector(Array1::zeros(values.ncols())));
    }
    let pooled = values.fold_axis(Axis(0), f32::NEG_INFINITY, |&acc, &v| acc.max(v));
    Ok(Activations::Vector(pooled))
}

/// `[steps, features]` 按行展开为 `[steps * features]`
pub fn flatten(input: Activations) -> Result<Activations> {
    match input {
        Activations::Vector(v) => Ok(Activations::Vector(v)),
        Activations::Sequence { values, .. } => {
            let flat: Vec<f32> = values.iter().copied().collect();
            Ok(Activations::Vector(Array1::from_vec(flat)))
        }
    }
}
