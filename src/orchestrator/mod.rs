//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责装配各层组件并驱动交互，是整个系统的"指挥中心"。
//!
//! ### `study_app` - 终端学习应用
//! - 管理应用生命周期（初始化、运行）
//! - 创建 LLM 客户端、抽取器、求解器、会话存储和历史日志
//! - 把终端输入转换为 `SessionController` 的操作
//! - 外部调用进行中按 Ctrl-C 重置会话
//!
//! ## 层次关系
//!
//! ```text
//! study_app (终端输入 / 输出)
//!     ↓
//! workflow::SessionController (批次状态机)
//!     ↓
//! services (抽取 / 求解 / 答疑)   storage (会话存储 / 历史日志)
//!     ↓
//! infrastructure (LlmClient)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → services / storage → infrastructure
//! 2. **无业务逻辑**：只做装配和展示，不做状态判断

pub mod study_app;

pub use study_app::App;
