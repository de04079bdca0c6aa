// src/model/config.rs

use std::io::Read;

use serde::Deserialize;

use crate::base::error::{Error, Result};
use crate::classifier::DecisionRule;
use crate::op::activation::Activation;
use crate::op::pad::PadSide;

/// 未在 config.json 或命令行指定时使用的序列长度
pub const DEFAULT_MAX_LENGTH: usize = 54;

/// 这个函数读取 config.json。
/// 导出脚本有时会把配置包在 `{"config": {...}}` 里，两种形式都接受。
pub fn load_config_from_json<R: Read>(mut json_reader: R) -> Result<ModelFileConfig> {
    let mut json_bytes = Vec::new();
    json_reader.read_to_end(&mut json_bytes).map_err(Error::Io)?;

    #[derive(Deserialize)]
    struct Wrapped {
        config: ModelFileConfig,
    }

    if let Ok(wrapped) = serde_json::from_slice::<Wrapped>(&json_bytes) {
        return Ok(wrapped.config);
    }

    let config = serde_json::from_slice::<ModelFileConfig>(&json_bytes).map_err(Error::SerdeError)?;
    Ok(config)
}

/// 直接从 config.json 反序列化的模型配置。
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFileConfig {
    /// 训练时 `pad_sequences` 使用的 maxlen
    #[serde(default)]
    pub max_length: Option<usize>,

    #[serde(default)]
    pub padding: PadSide,

    #[serde(default)]
    pub truncating: PadSide,

    /// 按顺序排列的层，相当于 Keras `Sequential`
    pub layers: Vec<LayerConfig>,

    /// 输出到标签的映射；缺省时根据输出维度推断
    #[serde(default)]
    pub decision: Option<DecisionRule>,
}

/// 单层配置，`type` 字段区分层的种类
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerConfig {
    Embedding {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input_dim: Option<usize>,
        #[serde(default)]
        output_dim: Option<usize>,
        #[serde(default)]
        mask_zero: bool,
    },
    Lstm {
        #[serde(default)]
        name: Option<String>,
        units: usize,
        #[serde(default)]
        return_sequences: bool,
        #[serde(default)]
        bidirectional: bool,
    },
    #[serde(rename = "global_average_pooling1d")]
    GlobalAveragePooling1d,
    #[serde(rename = "global_max_pooling1d")]
    GlobalMaxPooling1d,
    Flatten,
    Dropout {
        #[serde(default)]
        rate: f32,
    },
    Dense {
        #[serde(default)]
        name: Option<String>,
        units: usize,
        #[serde(default)]
        activation: Activation,
        #[serde(default = "default_use_bias")]
        use_bias: bool,
    },
}

fn default_use_bias() -> bool {
    true
}

impl LayerConfig {
    /// Keras 风格的默认层名前缀
    pub fn kind(&self) -> &'static str {
        match self {
            LayerConfig::Embedding { .. } => "embedding",
            LayerConfig::Lstm { .. } => "lstm",
            LayerConfig::GlobalAveragePooling1d => "global_average_pooling1d",
            LayerConfig::GlobalMaxPooling1d => "global_max_pooling1d",
            LayerConfig::Flatten => "flatten",
            LayerConfig::Dropout { .. } => "dropout",
            LayerConfig::Dense { .. } => "dense",
        }
    }

    pub fn explicit_name(&self) -> Option<&str> {
        match self {
            LayerConfig::Embedding { name, .. }
            | LayerConfig::Lstm { name, .. }
            | LayerConfig::Dense { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

impl ModelFileConfig {
    /// 进行参数有效性检查
    pub fn validate(&self) -> Result<()> {
        match self.layers.first() {
            Some(LayerConfig::Embedding { .. }) => {}
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "First layer must be an embedding, got '{}'",
                    other.kind()
                ))
                .into())
            }
            None => return Err(Error::InvalidArgument("Model has no layers".into()).into()),
        }

        if self
            .layers
            .iter()
            .skip(1)
            .any(|l| matches!(l, LayerConfig::Embedding { .. }))
        {
            return Err(Error::InvalidArgument("Only the first layer may be an embedding".into()).into());
        }

        if self.max_length == Some(0) {
            return Err(Error::InvalidArgument("max_length must be greater than 0".into()).into());
        }

        for layer in &self.layers {
            match layer {
                LayerConfig::Lstm { units: 0, .. } | LayerConfig::Dense { units: 0, .. } => {
                    return Err(Error::InvalidArgument(format!("Layer '{}' has zero units", layer.kind())).into());
                }
                LayerConfig::Dropout { rate } if !(0.0..1.0).contains(rate) => {
                    return Err(Error::InvalidArgument(format!("Dropout rate {} outside [0, 1)", rate)).into());
                }
                _ => {}
            }
        }

        Ok(())
    }
}
