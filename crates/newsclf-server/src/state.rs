//! Global State Management
//!
//! 管理 Server 的全局状态，包括：
//! - Config: 启动时确定的配置
//! - Classifier: 模型 + 词表，只加载一次，之后只读共享
//! - Fallback: 产物无法加载时是否返回占位结果

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use newsclf_core::Classifier;
use tokio::sync::OnceCell;

use crate::config::{LoadMode, ServerConfig};

/// 已加载的分类器及其加载时间
#[derive(Debug)]
pub struct LoadedClassifier {
    pub classifier: Arc<Classifier>,
    pub loaded_at: DateTime<Utc>,
}

/// 全局应用状态
///
/// 在所有 HTTP Handler 间共享。
#[derive(Clone, Debug)]
pub struct AppState {
    /// 配置
    pub config: Arc<ServerConfig>,

    /// 首次使用时初始化；并发的首批请求等待同一次加载。
    /// 加载失败不会被缓存，下一个请求会重新尝试。
    classifier: Arc<OnceCell<LoadedClassifier>>,

    /// 实际发起的加载次数（含失败）
    load_attempts: Arc<AtomicUsize>,

    /// 为 true 时 /predict 直接返回占位结果
    fallback: bool,
}

impl AppState {
    /// 创建新的应用状态，不触发加载
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            classifier: Arc::new(OnceCell::new()),
            load_attempts: Arc::new(AtomicUsize::new(0)),
            fallback: false,
        }
    }

    /// 使用一个已经加载好的分类器创建状态
    pub fn with_classifier(config: ServerConfig, classifier: Classifier) -> Self {
        let loaded = LoadedClassifier {
            classifier: Arc::new(classifier),
            loaded_at: Utc::now(),
        };
        Self {
            config: Arc::new(config),
            classifier: Arc::new(OnceCell::new_with(Some(loaded))),
            load_attempts: Arc::new(AtomicUsize::new(0)),
            fallback: false,
        }
    }

    /// 按配置的加载策略初始化。
    ///
    /// - `dummy_fallback`: 启动时尝试加载，失败则进入占位模式
    /// - `Eager`: 启动时加载，失败直接返回错误
    /// - `Lazy`: 不加载，等第一个请求
    pub async fn initialize(config: ServerConfig) -> Result<Self> {
        let mut state = Self::new(config);

        if state.config.loading.dummy_fallback {
            if let Err(e) = state.classifier().await {
                tracing::warn!(
                    "Model not loaded ({:#}), /predict will return the dummy result",
                    e
                );
                state.fallback = true;
            }
            return Ok(state);
        }

        match state.config.loading.mode {
            LoadMode::Eager => {
                state.classifier().await?;
            }
            LoadMode::Lazy => {
                tracing::info!("Lazy loading enabled, the model loads on the first /predict request");
            }
        }

        Ok(state)
    }

    /// 获取分类器，必要时加载
    pub async fn classifier(&self) -> Result<Arc<Classifier>> {
        let loaded = self
            .classifier
            .get_or_try_init(|| async {
                let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!("Loading classifier (attempt {})", attempt);
                let classifier_config = self.config.classifier_config();
                let classifier =
                    tokio::task::spawn_blocking(move || Classifier::load(&classifier_config)).await??;
                Ok::<_, anyhow::Error>(LoadedClassifier {
                    classifier: Arc::new(classifier),
                    loaded_at: Utc::now(),
                })
            })
            .await?;
        Ok(loaded.classifier.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.classifier.initialized()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.classifier.get().map(|l| l.loaded_at)
    }

    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn fallback_active(&self) -> bool {
        self.fallback
    }
}
