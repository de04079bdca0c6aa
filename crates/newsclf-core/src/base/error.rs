use std::path::PathBuf;

pub use anyhow::Result;
// 使用 thiserror 定义库内统一的错误类型，应用层再用 anyhow 向上传播
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} file not found: {}", path.display())]
    ArtifactNotFound {
        kind: ArtifactKind,
        path: PathBuf,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Serialization/Deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

/// 服务启动时需要读取的两类持久化产物
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Tokenizer,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "Model"),
            ArtifactKind::Tokenizer => write!(f, "Tokenizer"),
        }
    }
}

impl Error {
    /// 判断一个 anyhow 错误链的根因是否为产物缺失
    pub fn is_artifact_missing(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ArtifactNotFound { .. })
        )
    }
}
