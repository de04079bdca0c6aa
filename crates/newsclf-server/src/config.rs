//! Server Configuration
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//!
//! ```text
//! Default  ->  --config 文件 (JSON / YAML)  ->  命令行参数 / 环境变量
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use newsclf_core::ClassifierConfig;
use serde::{Deserialize, Serialize};

/// Command line arguments. Every value is optional so that unset flags fall
/// through to the config file or the defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "newsclf-server")]
#[command(about = "Fake news classification server: POST /predict {\"text\": ...}", long_about = None)]
pub struct Args {
    /// JSON or YAML config file
    #[arg(long, value_name = "FILE", env = "NEWSCLF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long, env = "NEWSCLF_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, env = "NEWSCLF_PORT")]
    pub port: Option<u16>,

    /// Directory holding config.json and model.safetensors
    #[arg(short, long, env = "NEWSCLF_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Tokenizer exported with Keras `Tokenizer.to_json()`
    #[arg(short, long, env = "NEWSCLF_TOKENIZER")]
    pub tokenizer: Option<PathBuf>,

    /// Override the sequence length declared in the model config
    #[arg(long, env = "NEWSCLF_MAX_LENGTH")]
    pub max_length: Option<usize>,

    /// Load artifacts at startup (eager) or on the first request (lazy)
    #[arg(long, value_enum, env = "NEWSCLF_LOAD_MODE")]
    pub load_mode: Option<LoadMode>,

    /// Answer with a fixed dummy payload when the artifacts cannot be loaded
    #[arg(long)]
    pub dummy_fallback: bool,

    /// Do not install the permissive CORS layer
    #[arg(long)]
    pub disable_cors: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = "NEWSCLF_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum, env = "NEWSCLF_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

/// Server 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP 服务器配置
    pub http: HttpConfig,

    /// 模型与词表的位置
    pub artifacts: ArtifactConfig,

    /// 加载策略
    pub loading: LoadingConfig,

    /// 日志配置
    pub log: LogConfig,
}

/// HTTP 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// 监听地址
    pub host: String,

    /// 监听端口
    pub port: u16,

    /// 是否启用 CORS
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub model_dir: PathBuf,
    pub tokenizer_path: PathBuf,
    pub max_length: Option<usize>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("fake_news_model"),
            tokenizer_path: PathBuf::from("tokenizer.json"),
            max_length: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// 启动时加载，失败即退出
    Eager,
    /// 第一个请求到来时加载
    #[default]
    Lazy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    pub mode: LoadMode,
    /// 产物加载失败时返回固定的占位结果，而不是报错
    pub dummy_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// 从配置文件加载（YAML 或 JSON）
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).context("Failed to parse YAML config")
            }
            Some("json") => serde_json::from_str(&content).context("Failed to parse JSON config"),
            _ => anyhow::bail!("Unsupported config file format (use .yaml, .yml, or .json)"),
        }
    }

    /// 加载配置（先读 --config 文件，再用命令行参数覆盖），并验证
    pub fn load(args: &Args) -> Result<Self> {
        let base = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.merge_args(args);
        config.validate()?;
        Ok(config)
    }

    /// 命令行中显式给出的值覆盖当前配置
    pub fn merge_args(mut self, args: &Args) -> Self {
        if let Some(host) = &args.host {
            self.http.host = host.clone();
        }
        if let Some(port) = args.port {
            self.http.port = port;
        }
        if args.disable_cors {
            self.http.enable_cors = false;
        }
        if let Some(dir) = &args.model_dir {
            self.artifacts.model_dir = dir.clone();
        }
        if let Some(path) = &args.tokenizer {
            self.artifacts.tokenizer_path = path.clone();
        }
        if let Some(len) = args.max_length {
            self.artifacts.max_length = Some(len);
        }
        if let Some(mode) = args.load_mode {
            self.loading.mode = mode;
        }
        if args.dummy_fallback {
            self.loading.dummy_fallback = true;
        }
        if let Some(level) = &args.log_level {
            self.log.level = level.clone();
        }
        if let Some(format) = args.log_format {
            self.log.format = format;
        }
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.http.host.trim().is_empty() {
            anyhow::bail!("http.host must not be empty");
        }
        if self.http.host.chars().any(char::is_whitespace) {
            anyhow::bail!("Invalid http.host: {:?}", self.http.host);
        }

        if self.artifacts.max_length == Some(0) {
            anyhow::bail!("max_length must be greater than 0");
        }

        match self.log.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {} (must be trace/debug/info/warn/error)",
                self.log.level
            ),
        }

        Ok(())
    }

    /// 解析监听地址，host 可以是 IP 或主机名（如 `localhost`）
    pub async fn resolve_addr(&self) -> Result<SocketAddr> {
        let host = self.http.host.as_str();
        tokio::net::lookup_host((host, self.http.port))
            .await
            .with_context(|| format!("Failed to resolve listen address {}:{}", host, self.http.port))?
            .next()
            .with_context(|| format!("No address found for {}:{}", host, self.http.port))
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            model_dir: self.artifacts.model_dir.clone(),
            tokenizer_path: self.artifacts.tokenizer_path.clone(),
            max_length: self.artifacts.max_length,
        }
    }
}
