//! 错误类型
//!
//! - `PipelineError`：抽取 / 求解两个阶段的错误，会以 `Failed` 状态呈现给用户
//! - `StorageError`：会话存储与历史日志的读写错误
//! - `ControllerError`：状态机拒绝某个操作时返回的错误
//!
//! 会话数据损坏（PersistenceCorruption）不是错误值：读取时记 warn 日志并视为"无会话"。

use std::path::PathBuf;
use thiserror::Error;

/// 抽取 / 求解流水线错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// 文档无法读取，或没有识别出任何题目
    #[error("抽取失败: {0}")]
    Extraction(String),

    /// 外部服务没有返回可用的结构化内容
    #[error("求解失败: {0}")]
    Resolution(String),

    /// 有返回内容，但无法解析为题目记录
    #[error("求解结果无法解析: {0}")]
    MalformedOutput(String),
}

impl PipelineError {
    /// 是否可以从同一游标重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Resolution(_) | PipelineError::MalformedOutput(_)
        )
    }

    /// 给用户看的提示语
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Extraction(detail) => format!(
                "无法从文档中识别题目，请尝试更清晰的文件。({})",
                detail
            ),
            PipelineError::Resolution(_) | PipelineError::MalformedOutput(_) => {
                "求解本批题目时出错，请重试。".to_string()
            }
        }
    }
}

/// 持久化读写错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("读写文件失败 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("序列化失败 ({path}): {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StorageError::Serialize {
            path: path.into(),
            source,
        }
    }
}

/// 状态机操作错误
#[derive(Debug, Error)]
pub enum ControllerError {
    /// 已有一个抽取或求解调用在进行中
    #[error("已有请求正在处理中 (当前状态: {phase})")]
    Busy { phase: &'static str },

    /// 当前状态不允许该操作
    #[error("当前状态 {phase} 不允许操作 {action}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("没有可恢复的会话")]
    NoSavedSession,

    #[error("历史记录不存在: {0}")]
    HistoryEntryNotFound(u64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// 状态机操作结果类型
pub type ControllerResult<T> = Result<T, ControllerError>;
