//! # Study Session
//!
//! 把一份试卷文档拆成题目、按批求解并逐批练习的学习应用
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `LlmClient` - 唯一的模型调用入口，支持附带文档
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `Extractor` - 第一阶段：一次性把文档拆成题目描述符
//! - `Resolver` - 第二阶段：按批求解题目，给出答案和讲解
//! - `Tutor` - 针对单道题答疑
//!
//! ### ③ 存储层（Storage）
//! - `SessionStore` - 保存可恢复的批次会话（描述符 + 游标）
//! - `HistoryLog` - 只追加的成绩历史
//!
//! ### ④ 流程层（Workflow）
//! - `Phase` - 会话状态
//! - `SessionController` - 状态机：抽取 → 逐批求解 → 答题 → 完成
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/study_app` - 终端应用，装配组件并驱动交互
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{ControllerError, ControllerResult, PipelineError, StorageError};
pub use infrastructure::LlmClient;
pub use models::{
    Answer, AnswerRecord, BatchSessionState, Document, HistoryEntry, ProblemDescriptor,
    SolvedProblem,
};
pub use orchestrator::App;
pub use services::{Extractor, Resolver};
pub use storage::{HistoryLog, SessionStore};
pub use workflow::{Phase, ResumeOutcome, SessionController};
