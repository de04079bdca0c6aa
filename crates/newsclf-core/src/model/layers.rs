//! 由 config.json + 权重组装出的层

use std::collections::HashMap;
use std::fmt;

use crate::base::error::{Error, Result};
use crate::model::config::LayerConfig;
use crate::model::safetensor_loader::WeightMap;
use crate::op::dense::Dense;
use crate::op::embedding::Embedding;
use crate::op::lstm::{Lstm, LstmCell};
use crate::op::{pooling, Activations};

/// 层输出的形状（不含 batch 维）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sequence { steps: usize, features: usize },
    Vector(usize),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Sequence { steps, features } => write!(f, "({}, {})", steps, features),
            Shape::Vector(n) => write!(f, "({},)", n),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Layer {
    Embedding(Embedding),
    Lstm(Lstm),
    GlobalAveragePooling1d,
    GlobalMaxPooling1d,
    Flatten,
    /// 推理阶段 dropout 为恒等映射
    Dropout,
    Dense(Dense),
}

#[derive(Debug, Clone)]
pub struct NamedLayer {
    pub name: String,
    pub layer: Layer,
    pub output_shape: Shape,
}

impl Layer {
    /// 除 embedding 外的所有层都在这里前向；embedding 直接消费 token ID
    pub fn forward(&self, input: Activations) -> Result<Activations> {
        match self {
            Layer::Embedding(_) => Err(Error::InvalidArgument(
                "Embedding must be the first layer and consumes token ids".into(),
            )
            .into()),
            Layer::Lstm(lstm) => lstm.forward(input),
            Layer::GlobalAveragePooling1d => pooling::global_average_pooling1d(input),
            Layer::GlobalMaxPooling1d => pooling::global_max_pooling1d(input),
            Layer::Flatten => pooling::flatten(input),
            Layer::Dropout => Ok(input),
            Layer::Dense(dense) => dense.forward(input),
        }
    }
}

/// 按 Keras 的规则生成层名：第一个 `dense`，之后 `dense_1`、`dense_2`……
#[derive(Default)]
struct LayerNamer {
    counts: HashMap<&'static str, usize>,
}

impl LayerNamer {
    fn name_for(&mut self, config: &LayerConfig) -> String {
        let kind = config.kind();
        let n = self.counts.entry(kind).or_insert(0);
        let generated = if *n == 0 { kind.to_string() } else { format!("{}_{}", kind, n) };
        *n += 1;
        config.explicit_name().map(str::to_string).unwrap_or(generated)
    }
}

fn sequence_features(shape: Shape, layer: &str) -> Result<(usize, usize)> {
    match shape {
        Shape::Sequence { steps, features } => Ok((steps, features)),
        Shape::Vector(_) => Err(Error::InvalidArgument(format!(
            "Layer '{}' expects a sequence input, but the previous layer outputs a vector",
            layer
        ))
        .into()),
    }
}

fn load_lstm_cell(weights: &mut WeightMap, prefix: &str, in_features: usize, units: usize) -> Result<LstmCell> {
    let cell = LstmCell::new(
        weights.take_array2(&format!("{}.kernel", prefix))?,
        weights.take_array2(&format!("{}.recurrent_kernel", prefix))?,
        weights.take_array1(&format!("{}.bias", prefix))?,
    )?;
    if cell.in_features() != in_features || cell.units() != units {
        return Err(Error::ShapeMismatch {
            context: format!("{}.kernel", prefix),
            expected: vec![in_features, 4 * units],
            actual: vec![cell.in_features(), 4 * cell.units()],
        }
        .into());
    }
    Ok(cell)
}

/// 依次构建每一层，同时推导并检查形状
pub fn build_layers(configs: &[LayerConfig], weights: &mut WeightMap, max_length: usize) -> Result<Vec<NamedLayer>> {
    let mut namer = LayerNamer::default();
    let mut layers = Vec::with_capacity(configs.len());
    let mut shape: Option<Shape> = None;

    for config in configs {
        let name = namer.name_for(config);

        let (layer, output_shape) = match (config, shape) {
            (LayerConfig::Embedding { input_dim, output_dim, mask_zero, .. }, None) => {
                let table = weights.take_array2(&format!("{}.embeddings", name))?;
                let (rows, cols) = table.dim();
                if input_dim.map_or(false, |d| d != rows) || output_dim.map_or(false, |d| d != cols) {
                    return Err(Error::ShapeMismatch {
                        context: format!("{}.embeddings", name),
                        expected: vec![input_dim.unwrap_or(rows), output_dim.unwrap_or(cols)],
                        actual: vec![rows, cols],
                    }
                    .into());
                }
                (
                    Layer::Embedding(Embedding::new(table, *mask_zero)),
                    Shape::Sequence { steps: max_length, features: cols },
                )
            }
            (LayerConfig::Embedding { .. }, Some(_)) | (_, None) => {
                return Err(Error::InvalidArgument(format!(
                    "Layer '{}' is out of place: the model must start with exactly one embedding",
                    name
                ))
                .into());
            }
            (LayerConfig::Lstm { units, return_sequences, bidirectional, .. }, Some(prev)) => {
                let (steps, features) = sequence_features(prev, &name)?;
                let (forward, backward) = if *bidirectional {
                    (
                        load_lstm_cell(weights, &format!("{}.forward", name), features, *units)?,
                        Some(load_lstm_cell(weights, &format!("{}.backward", name), features, *units)?),
                    )
                } else {
                    (load_lstm_cell(weights, &name, features, *units)?, None)
                };
                let lstm = Lstm { forward, backward, return_sequences: *return_sequences };
                let out = lstm.output_features();
                let shape = if *return_sequences {
                    Shape::Sequence { steps, features: out }
                } else {
                    Shape::Vector(out)
                };
                (Layer::Lstm(lstm), shape)
            }
            (LayerConfig::GlobalAveragePooling1d, Some(prev)) => {
                let (_, features) = sequence_features(prev, &name)?;
                (Layer::GlobalAveragePooling1d, Shape::Vector(features))
            }
            (LayerConfig::GlobalMaxPooling1d, Some(prev)) => {
                let (_, features) = sequence_features(prev, &name)?;
                (Layer::GlobalMaxPooling1d, Shape::Vector(features))
            }
            (LayerConfig::Flatten, Some(prev)) => {
                let width = match prev {
                    Shape::Sequence { steps, features } => steps * features,
                    Shape::Vector(n) => n,
                };
                (Layer::Flatten, Shape::Vector(width))
            }
            (LayerConfig::Dropout { .. }, Some(prev)) => (Layer::Dropout, prev),
            (LayerConfig::Dense { units, activation, use_bias, .. }, Some(prev)) => {
                let in_features = match prev {
                    Shape::Sequence { features, .. } => features,
                    Shape::Vector(n) => n,
                };
                let kernel = weights.take_array2(&format!("{}.kernel", name))?;
                if kernel.dim() != (in_features, *units) {
                    return Err(Error::ShapeMismatch {
                        context: format!("{}.kernel", name),
                        expected: vec![in_features, *units],
                        actual: kernel.shape().to_vec(),
                    }
                    .into());
                }
                let bias = if *use_bias {
                    Some(weights.take_array1(&format!("{}.bias", name))?)
                } else {
                    None
                };
                let shape = match prev {
                    Shape::Sequence { steps, .. } => Shape::Sequence { steps, features: *units },
                    Shape::Vector(_) => Shape::Vector(*units),
                };
                (Layer::Dense(Dense::new(kernel, bias, *activation)?), shape)
            }
        };

        tracing::debug!("layer '{}' output shape {}", name, output_shape);
        shape = Some(output_shape);
        layers.push(NamedLayer { name, layer, output_shape });
    }

    Ok(layers)
}
