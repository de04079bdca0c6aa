//! Text classifier
//!
//! 把 tokenizer、定长填充、前向网络与标签映射串成一次推理：
//!
//! ```text
//! text -> texts_to_sequences -> pad/truncate(max_length) -> forward -> DecisionRule -> Prediction
//! ```

use std::fmt;
use std::path::PathBuf;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::base::error::{ArtifactKind, Error, Result};
use crate::model::SequentialModel;
use crate::op::pad::pad_sequence;
use crate::tokenizer::KerasTokenizer;

/// 分类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    pub fn other(self) -> Self {
        match self {
            Label::Real => Label::Fake,
            Label::Fake => Label::Real,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "REAL",
            Label::Fake => "FAKE",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_threshold() -> f32 {
    0.5
}

fn default_positive() -> Label {
    Label::Real
}

/// 模型输出到标签的映射规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DecisionRule {
    /// 单个 sigmoid 输出：`p >= threshold` 判为 `positive`，否则为另一类。
    /// confidence 为原始概率 `p`。
    Threshold {
        #[serde(default = "default_threshold")]
        threshold: f32,
        #[serde(default = "default_positive")]
        positive: Label,
    },
    /// softmax 输出：取最大分量的下标对应的标签，confidence 为该分量。
    Argmax { classes: Vec<Label> },
}

impl DecisionRule {
    /// 根据输出维度推断默认规则：1 维用阈值 (1=REAL)，2 维用 argmax (1=FAKE)
    pub fn for_width(width: usize) -> Result<Self> {
        match width {
            1 => Ok(DecisionRule::Threshold {
                threshold: default_threshold(),
                positive: default_positive(),
            }),
            2 => Ok(DecisionRule::Argmax {
                classes: vec![Label::Real, Label::Fake],
            }),
            n => Err(Error::InvalidArgument(format!(
                "Cannot infer labels for a {}-way output, declare `decision.classes` in config.json",
                n
            ))
            .into()),
        }
    }

    pub fn check_width(&self, width: usize) -> Result<()> {
        match self {
            DecisionRule::Threshold { threshold, .. } => {
                if width != 1 {
                    return Err(Error::InvalidArgument(format!(
                        "Threshold decision needs a single output unit, model has {}",
                        width
                    ))
                    .into());
                }
                if !(0.0..=1.0).contains(threshold) {
                    return Err(Error::InvalidArgument(format!("Threshold {} outside [0, 1]", threshold)).into());
                }
            }
            DecisionRule::Argmax { classes } => {
                if width < 2 || classes.len() != width {
                    return Err(Error::InvalidArgument(format!(
                        "Argmax decision lists {} classes but model outputs {} values",
                        classes.len(),
                        width
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// 将模型输出映射为标签与置信度
    pub fn apply(&self, output: &Array1<f32>) -> Result<Prediction> {
        let (label, confidence) = match self {
            DecisionRule::Threshold { threshold, positive } => {
                let p = *output
                    .get(0)
                    .ok_or_else(|| Error::InvalidOutput("empty model output".into()))?;
                check_probability(p)?;
                let label = if p >= *threshold { *positive } else { positive.other() };
                (label, p)
            }
            DecisionRule::Argmax { classes } => {
                if output.len() != classes.len() {
                    return Err(Error::InvalidOutput(format!(
                        "expected {} values, model returned {}",
                        classes.len(),
                        output.len()
                    ))
                    .into());
                }
                if let Some(bad) = output.iter().find(|v| v.is_nan()) {
                    return Err(Error::InvalidOutput(format!("model output contains {}", bad)).into());
                }
                // 与 numpy.argmax 一致，并列时取第一个
                let (index, &max) = output
                    .iter()
                    .enumerate()
                    .fold(None, |best: Option<(usize, &f32)>, (i, v)| match best {
                        Some((_, b)) if *b >= *v => best,
                        _ => Some((i, v)),
                    })
                    .ok_or_else(|| Error::InvalidOutput("empty model output".into()))?;
                check_probability(max)?;
                (classes[index], max)
            }
        };

        Ok(Prediction { label, confidence })
    }
}

fn check_probability(p: f32) -> Result<()> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(Error::InvalidOutput(format!(
            "confidence {} is not a probability, the last layer must end in sigmoid or softmax",
            p
        ))
        .into());
    }
    Ok(())
}

/// 一次推理的结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f32,
}

/// 推理过程中的中间结果，供 inspect 工具排查词表与模型问题
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub tokens: Vec<u32>,
    pub padded: Vec<u32>,
    pub output: Vec<f32>,
    pub prediction: Prediction,
}

/// 产物位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// 包含 config.json 与 model.safetensors 的目录
    pub model_dir: PathBuf,
    pub tokenizer_path: PathBuf,
    /// 覆盖 config.json 中的 max_length
    pub max_length: Option<usize>,
}

/// 模型 + 词表，加载一次后只读共享
#[derive(Debug, Clone)]
pub struct Classifier {
    model: SequentialModel,
    tokenizer: KerasTokenizer,
    decision: DecisionRule,
}

impl Classifier {
    /// 加载模型与 tokenizer；任一产物缺失时返回 `Error::ArtifactNotFound`。
    pub fn load(config: &ClassifierConfig) -> Result<Self> {
        if !config.model_dir.exists() {
            return Err(Error::ArtifactNotFound {
                kind: ArtifactKind::Model,
                path: config.model_dir.clone(),
            }
            .into());
        }
        if !config.tokenizer_path.exists() {
            return Err(Error::ArtifactNotFound {
                kind: ArtifactKind::Tokenizer,
                path: config.tokenizer_path.clone(),
            }
            .into());
        }

        tracing::info!(
            "Loading model from {} and tokenizer from {}...",
            config.model_dir.display(),
            config.tokenizer_path.display()
        );

        let model = SequentialModel::load(&config.model_dir, config.max_length)?;
        let tokenizer = KerasTokenizer::from_file(&config.tokenizer_path)?;
        let classifier = Self::from_parts(model, tokenizer)?;

        tracing::info!(
            "Model loaded successfully: {} (max_length={}, decision={:?})",
            classifier.model.summary(),
            classifier.model.max_length(),
            classifier.decision
        );

        Ok(classifier)
    }

    pub fn from_parts(model: SequentialModel, tokenizer: KerasTokenizer) -> Result<Self> {
        let decision = match model.decision() {
            Some(rule) => rule.clone(),
            None => DecisionRule::for_width(model.output_width())?,
        };
        decision.check_width(model.output_width())?;

        if let Some(max_index) = tokenizer.max_emitted_index() {
            if max_index as usize >= model.vocab_size() {
                tracing::warn!(
                    "Tokenizer can emit index {} but the embedding table has {} rows, such words will fail prediction",
                    max_index,
                    model.vocab_size()
                );
            }
        }

        Ok(Self { model, tokenizer, decision })
    }

    /// 文本 -> 定长序列
    pub fn encode(&self, text: &str) -> (Vec<u32>, Vec<u32>) {
        let tokens = self.tokenizer.texts_to_sequences(text);
        let padded = pad_sequence(
            &tokens,
            self.model.max_length(),
            self.model.padding(),
            self.model.truncating(),
            0,
        );
        (tokens, padded)
    }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let (_, padded) = self.encode(text);
        let output = self.model.forward(&padded)?;
        self.decision.apply(&output)
    }

    pub fn inspect(&self, text: &str) -> Result<Inspection> {
        let (tokens, padded) = self.encode(text);
        let output = self.model.forward(&padded)?;
        let prediction = self.decision.apply(&output)?;
        Ok(Inspection {
            tokens,
            padded,
            output: output.to_vec(),
            prediction,
        })
    }

    pub fn model(&self) -> &SequentialModel {
        &self.model
    }

    pub fn tokenizer(&self) -> &KerasTokenizer {
        &self.tokenizer
    }

    pub fn decision(&self) -> &DecisionRule {
        &self.decision
    }
}
