pub mod config;
pub mod layers;
pub mod safetensor_loader;

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array1;

use crate::base::error::{ArtifactKind, Error, Result};
use crate::classifier::DecisionRule;
use crate::model::config::{ModelFileConfig, DEFAULT_MAX_LENGTH};
use crate::model::layers::{Layer, NamedLayer, Shape};
use crate::model::safetensor_loader::WeightMap;
use crate::op::pad::PadSide;
use crate::op::Activations;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// 只读的前向网络：一条定长 token 序列进，一个输出向量出。
#[derive(Debug, Clone)]
pub struct SequentialModel {
    layers: Vec<NamedLayer>,
    max_length: usize,
    padding: PadSide,
    truncating: PadSide,
    decision: Option<DecisionRule>,
    source: PathBuf,
}

impl SequentialModel {
    /// 从模型目录加载 `config.json` 与 `model.safetensors`。
    ///
    /// `max_length_override` 优先于 config.json 中的 `max_length`。
    pub fn load<P: AsRef<Path>>(path: P, max_length_override: Option<usize>) -> Result<Self> {
        let model_dir = path.as_ref();
        if !model_dir.exists() {
            return Err(Error::ArtifactNotFound {
                kind: ArtifactKind::Model,
                path: model_dir.to_path_buf(),
            }
            .into());
        }

        let config_path = model_dir.join(CONFIG_FILE);
        let weights_path = model_dir.join(WEIGHTS_FILE);
        for required in [&config_path, &weights_path] {
            if !required.exists() {
                return Err(Error::ArtifactNotFound {
                    kind: ArtifactKind::Model,
                    path: required.clone(),
                }
                .into());
            }
        }

        let config_file = File::open(&config_path).map_err(Error::Io)?;
        let file_config = config::load_config_from_json(config_file)
            .map_err(|e| Error::InvalidArgument(format!("Failed to parse config.json: {}", e)))?;

        let mut weights = WeightMap::load(&weights_path)?;
        tracing::debug!("{} tensors read from {}", weights.len(), weights_path.display());

        let model = Self::from_parts(file_config, &mut weights, max_length_override, model_dir.to_path_buf())?;

        let unused = weights.remaining();
        if !unused.is_empty() {
            tracing::warn!("Unused tensors in {}: {:?}", weights_path.display(), unused);
        }

        Ok(model)
    }

    /// 由已解析的配置和权重组装模型
    pub fn from_parts(
        file_config: ModelFileConfig,
        weights: &mut WeightMap,
        max_length_override: Option<usize>,
        source: PathBuf,
    ) -> Result<Self> {
        file_config.validate()?;

        let max_length = match (max_length_override, file_config.max_length) {
            (Some(0), _) => {
                return Err(Error::InvalidArgument("max_length must be greater than 0".into()).into())
            }
            (Some(len), Some(configured)) if len != configured => {
                tracing::warn!(
                    "max_length overridden to {}, model config.json declares {}",
                    len,
                    configured
                );
                len
            }
            (Some(len), _) => len,
            (None, Some(configured)) => configured,
            (None, None) => {
                tracing::warn!("config.json has no max_length, using default {}", DEFAULT_MAX_LENGTH);
                DEFAULT_MAX_LENGTH
            }
        };

        let layers = layers::build_layers(&file_config.layers, weights, max_length)?;

        let model = Self {
            layers,
            max_length,
            padding: file_config.padding,
            truncating: file_config.truncating,
            decision: file_config.decision,
            source,
        };

        match model.output_shape() {
            Shape::Vector(n) if n >= 1 => {}
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Model must end in a non-empty vector (add pooling or set return_sequences=false), got {}",
                    other
                ))
                .into())
            }
        }

        if let Some(rule) = &model.decision {
            rule.check_width(model.output_width())?;
        }

        Ok(model)
    }

    /// 执行一次完整的前向传播。`ids` 的长度必须等于 `max_length`。
    pub fn forward(&self, ids: &[u32]) -> Result<Array1<f32>> {
        if ids.len() != self.max_length {
            return Err(Error::ShapeMismatch {
                context: "model input".into(),
                expected: vec![self.max_length],
                actual: vec![ids.len()],
            }
            .into());
        }

        let (first, rest) = self
            .layers
            .split_first()
            .ok_or_else(|| Error::InvalidArgument("Model has no layers".into()))?;
        let Layer::Embedding(embedding) = &first.layer else {
            return Err(Error::InvalidArgument("First layer must be an embedding".into()).into());
        };

        let mut activations = embedding.forward(ids)?;
        for named in rest {
            activations = named.layer.forward(activations)?;
        }

        match activations {
            Activations::Vector(out) => Ok(out),
            Activations::Sequence { .. } => {
                Err(Error::InvalidOutput("model produced a sequence instead of a vector".into()).into())
            }
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn padding(&self) -> PadSide {
        self.padding
    }

    pub fn truncating(&self) -> PadSide {
        self.truncating
    }

    /// config.json 中显式声明的决策规则
    pub fn decision(&self) -> Option<&DecisionRule> {
        self.decision.as_ref()
    }

    pub fn output_shape(&self) -> Shape {
        self.layers
            .last()
            .map(|l| l.output_shape)
            .unwrap_or(Shape::Vector(0))
    }

    pub fn output_width(&self) -> usize {
        match self.output_shape() {
            Shape::Vector(n) => n,
            Shape::Sequence { features, .. } => features,
        }
    }

    pub fn vocab_size(&self) -> usize {
        match self.layers.first().map(|l| &l.layer) {
            Some(Layer::Embedding(e)) => e.vocab_size(),
            _ => 0,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 类似 Keras `model.summary()` 的单行描述
    pub fn summary(&self) -> String {
        self.layers
            .iter()
            .map(|l| format!("{}{}", l.name, l.output_shape))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
