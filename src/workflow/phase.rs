//! 会话状态
//!
//! `Idle → Scanning → Resolving → Presenting → (Resolving | Completed) → Reviewing`，
//! 以及从 `Scanning` / `Resolving` 进入的 `Failed`。

use std::fmt::Display;
use std::ops::Range;

use crate::error::PipelineError;
use crate::models::history::percentage;
use crate::models::{Answer, AnswerRecord, HistoryEntry, SolvedProblem};

/// 控制器当前所处的状态（展示层只读快照）
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// 没有活动会话
    Idle,
    /// 正在抽取题目
    Scanning { document: String },
    /// 正在求解 `bounds` 范围内的题目
    Resolving { bounds: Range<usize>, total: usize },
    /// 答题中
    Presenting(BatchQuiz),
    /// 本批结束，还有剩余题目
    Results(BatchOutcome),
    /// 整份文档完成；恢复时发现已完成则没有批次结果
    Completed(Option<BatchOutcome>),
    /// 查看某条历史记录
    Reviewing(HistoryEntry),
    Failed(Failure),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Scanning { .. } => "Scanning",
            Phase::Resolving { .. } => "Resolving",
            Phase::Presenting(_) => "Presenting",
            Phase::Results(_) => "Results",
            Phase::Completed(_) => "Completed",
            Phase::Reviewing(_) => "Reviewing",
            Phase::Failed(_) => "Failed",
        }
    }

    /// 是否有外部调用在进行中
    pub fn is_pending(&self) -> bool {
        matches!(self, Phase::Scanning { .. } | Phase::Resolving { .. })
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 答题中的批次（批内进度只是本地状态，不单独持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuiz {
    /// 批次起始游标
    pub start: usize,
    /// 文档中的题目总数
    pub total: usize,
    pub problems: Vec<SolvedProblem>,
    pub answers: AnswerRecord,
    /// 当前题目在批内的位置
    pub position: usize,
}

impl BatchQuiz {
    pub fn new(start: usize, total: usize, problems: Vec<SolvedProblem>) -> Self {
        Self {
            start,
            total,
            problems,
            answers: AnswerRecord::new(),
            position: 0,
        }
    }

    pub fn current(&self) -> Option<&SolvedProblem> {
        self.problems.get(self.position)
    }

    /// 记录当前题目的作答并前进一题；返回批次是否已答完
    pub fn answer_current(&mut self, answer: Answer) -> bool {
        if let Some(problem) = self.problems.get(self.position) {
            self.answers.insert(problem.id, answer);
            self.position += 1;
        }
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.problems.len()
    }
}

/// 一个批次的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub start: usize,
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    /// 写入历史日志失败时为 `None`
    pub history_id: Option<u64>,
    /// 推进后的游标
    pub cursor: usize,
    /// 剩余未求解的题目数
    pub remaining: usize,
}

impl BatchOutcome {
    pub fn new(
        start: usize,
        score: usize,
        total: usize,
        history_id: Option<u64>,
        cursor: usize,
        remaining: usize,
    ) -> Self {
        Self {
            start,
            score,
            total,
            percentage: percentage(score, total),
            history_id,
            cursor,
            remaining,
        }
    }
}

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Scanning,
    Resolving,
}

/// 失败信息
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub stage: FailureStage,
    pub error: PipelineError,
    /// 给用户看的提示
    pub message: String,
}

impl Failure {
    pub fn new(stage: FailureStage, error: PipelineError) -> Self {
        let message = error.user_message();
        Self {
            stage,
            error,
            message,
        }
    }

    /// 只有求解阶段的失败可以从同一游标重试
    pub fn can_retry(&self) -> bool {
        self.stage == FailureStage::Resolving && self.error.is_retryable()
    }
}
