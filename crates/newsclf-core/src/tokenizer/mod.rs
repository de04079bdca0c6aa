//! Word-level Tokenizer
//!
//! 读取 Keras `Tokenizer.to_json()` 导出的词表，并复现 `texts_to_sequences`
//! 的切词与查表规则：小写化、过滤标点、按分隔符切分、超出 `num_words`
//! 或未登录的词映射为 OOV 或直接丢弃。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::base::error::{ArtifactKind, Error, Result};

/// Keras 默认的过滤字符集
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// `to_json()` 的顶层结构: `{"class_name": "Tokenizer", "config": {...}}`
#[derive(Deserialize)]
struct TokenizerEnvelope {
    #[serde(default)]
    class_name: Option<String>,
    config: TokenizerFileConfig,
}

/// Keras 把 `word_index` 写成一段 JSON 字符串，手工导出的文件则常见普通对象
#[derive(Deserialize)]
#[serde(untagged)]
enum WordIndexRepr {
    Encoded(String),
    Map(HashMap<String, u32>),
}

/// 直接从 tokenizer.json 反序列化的配置，字段名与 Keras 保持一致。
#[derive(Deserialize)]
struct TokenizerFileConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_lower")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    char_level: bool,
    #[serde(default)]
    oov_token: Option<String>,
    word_index: WordIndexRepr,
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_lower() -> bool {
    true
}

fn default_split() -> String {
    " ".to_string()
}

/// 预训练好的词表，服务期间只读，可在多个请求间共享。
#[derive(Debug, Clone)]
pub struct KerasTokenizer {
    word_index: HashMap<String, u32>,
    num_words: Option<usize>,
    filters: HashSet<char>,
    lower: bool,
    split: String,
    char_level: bool,
    oov_token: Option<String>,
    /// OOV token 在词表中的下标；配置了 oov_token 但词表中没有时为 None
    oov_index: Option<u32>,
}

impl KerasTokenizer {
    /// 从文件加载 Tokenizer
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ArtifactNotFound {
                kind: ArtifactKind::Tokenizer,
                path: path.to_path_buf(),
            }
            .into());
        }

        let json = fs::read_to_string(path).map_err(Error::Io)?;
        let tokenizer = Self::from_json(&json)?;

        tracing::info!(
            "Tokenizer loaded from {}, vocab_size={}, num_words={:?}, oov_token={:?}",
            path.display(),
            tokenizer.vocab_size(),
            tokenizer.num_words,
            tokenizer.oov_token
        );

        Ok(tokenizer)
    }

    /// 解析 `to_json()` 输出；也接受去掉外层 `class_name` 包装的 config 对象。
    pub fn from_json(json: &str) -> Result<Self> {
        let file_config = match serde_json::from_str::<TokenizerEnvelope>(json) {
            Ok(envelope) => {
                if let Some(class_name) = envelope.class_name.as_deref() {
                    if class_name != "Tokenizer" {
                        tracing::warn!("Unexpected tokenizer class_name '{}', parsing anyway", class_name);
                    }
                }
                envelope.config
            }
            Err(_) => serde_json::from_str::<TokenizerFileConfig>(json).map_err(|e| {
                Error::InvalidArgument(format!("Failed to parse tokenizer json: {}", e))
            })?,
        };

        Self::from_config(file_config)
    }

    fn from_config(file_config: TokenizerFileConfig) -> Result<Self> {
        let word_index = match file_config.word_index {
            WordIndexRepr::Map(map) => map,
            WordIndexRepr::Encoded(encoded) => serde_json::from_str(&encoded).map_err(|e| {
                Error::InvalidArgument(format!("Failed to decode embedded word_index: {}", e))
            })?,
        };

        if file_config.split.is_empty() && !file_config.char_level {
            return Err(Error::InvalidArgument("Tokenizer split separator must not be empty".into()).into());
        }

        let oov_index = file_config
            .oov_token
            .as_ref()
            .and_then(|token| word_index.get(token).copied());

        if file_config.oov_token.is_some() && oov_index.is_none() {
            tracing::warn!(
                "oov_token {:?} is configured but missing from word_index, unknown words will be dropped",
                file_config.oov_token
            );
        }

        Ok(Self {
            word_index,
            // Keras 中 num_words 为 0 等同于不限制
            num_words: file_config.num_words.filter(|&n| n > 0),
            filters: file_config.filters.chars().collect(),
            lower: file_config.lower,
            split: file_config.split,
            char_level: file_config.char_level,
            oov_token: file_config.oov_token,
            oov_index,
        })
    }

    /// 将文本切分为词序列（不查表）
    pub fn text_to_word_sequence(&self, text: &str) -> Vec<String> {
        let text = if self.lower { text.to_lowercase() } else { text.to_string() };

        let mut translated = String::with_capacity(text.len());
        for c in text.chars() {
            if self.filters.contains(&c) {
                translated.push_str(&self.split);
            } else {
                translated.push(c);
            }
        }

        translated
            .split(self.split.as_str())
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 编码文本为 Token IDs
    pub fn texts_to_sequences(&self, text: &str) -> Vec<u32> {
        let words = if self.char_level {
            let text = if self.lower { text.to_lowercase() } else { text.to_string() };
            text.chars().map(|c| c.to_string()).collect()
        } else {
            self.text_to_word_sequence(text)
        };

        let mut ids = Vec::with_capacity(words.len());
        for word in &words {
            match self.word_index.get(word) {
                Some(&index) => {
                    let beyond_limit = self
                        .num_words
                        .map_or(false, |limit| index as usize >= limit);
                    if !beyond_limit {
                        ids.push(index);
                    } else if let Some(oov) = self.oov_index {
                        ids.push(oov);
                    }
                }
                None => {
                    if let Some(oov) = self.oov_index {
                        ids.push(oov);
                    }
                }
            }
        }
        ids
    }

    /// 获取词汇表大小
    pub fn vocab_size(&self) -> usize {
        self.word_index.len()
    }

    pub fn num_words(&self) -> Option<usize> {
        self.num_words
    }

    pub fn oov_index(&self) -> Option<u32> {
        self.oov_index
    }

    pub fn word_id(&self, word: &str) -> Option<u32> {
        self.word_index.get(word).copied()
    }

    /// `texts_to_sequences` 可能产生的最大下标
    pub fn max_emitted_index(&self) -> Option<u32> {
        self.word_index
            .values()
            .copied()
            .filter(|&i| self.num_words.map_or(true, |limit| (i as usize) < limit))
            .chain(self.oov_index)
            .max()
    }
}
