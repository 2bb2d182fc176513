use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// 默认配置文件名（位于工作目录）
const DEFAULT_CONFIG_FILE: &str = "study.toml";
/// 唯一活动会话的固定键
const SESSION_KEY: &str = "active_session";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 每批求解的题目数量
    pub batch_size: usize,
    /// 会话与历史记录的存放目录
    pub data_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub extract_model_name: String,
    pub solve_model_name: String,
    pub tutor_model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 3,
            data_dir: ".study_session".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            extract_model_name: "gemini-2.5-flash".to_string(),
            solve_model_name: "gemini-2.5-flash".to_string(),
            tutor_model_name: "gemini-2.5-flash".to_string(),
            temperature: 0.2,
            max_tokens: 8192,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 默认值 → TOML 配置文件（可选）→ 环境变量
    ///
    /// 配置文件路径取 `STUDY_CONFIG`，未设置时使用工作目录下的 `study.toml`（存在时）。
    pub fn load() -> Result<Self> {
        let path = match std::env::var("STUDY_CONFIG") {
            Ok(p) => Some(PathBuf::from(p)),
            Err(_) => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let base = match path {
            Some(path) => Self::from_toml_file(&path)?,
            None => Self::default(),
        };

        Ok(base.with_env_overrides())
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        info!("已加载配置文件: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config.normalized())
    }

    fn with_env_overrides(self) -> Self {
        let env = |name: &str| std::env::var(name).ok();
        let config = Self {
            batch_size: env("BATCH_SIZE").and_then(|v| v.parse().ok()).unwrap_or(self.batch_size),
            data_dir: env("DATA_DIR").unwrap_or(self.data_dir),
            verbose_logging: env("VERBOSE_LOGGING").and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            llm_api_key: env("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            extract_model_name: env("EXTRACT_MODEL_NAME").unwrap_or(self.extract_model_name),
            solve_model_name: env("SOLVE_MODEL_NAME").unwrap_or(self.solve_model_name),
            tutor_model_name: env("TUTOR_MODEL_NAME").unwrap_or(self.tutor_model_name),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        config.normalized()
    }

    fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self
    }

    /// 活动会话文件
    pub fn session_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(format!("{}.json", SESSION_KEY))
    }

    /// 历史记录文件
    pub fn history_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("history.json")
    }
}
