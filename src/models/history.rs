use serde::{Deserialize, Serialize};

use super::problem::{AnswerRecord, SolvedProblem};

/// 历史记录：一个已完成批次的结果
///
/// 写入后不可修改；`id` 在追加时由历史日志分配。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// 毫秒时间戳
    pub timestamp: i64,
    pub score: usize,
    pub total: usize,
    pub problems: Vec<SolvedProblem>,
    pub answers: AnswerRecord,
}

impl HistoryEntry {
    pub fn new(
        score: usize,
        total: usize,
        problems: Vec<SolvedProblem>,
        answers: AnswerRecord,
    ) -> Self {
        Self {
            id: None,
            timestamp: super::session::now_millis(),
            score,
            total,
            problems,
            answers,
        }
    }

    /// 正确率（0-100，四舍五入）
    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.total)
    }

    /// 本地时间格式的日期，用于展示
    pub fn display_date(&self) -> String {
        use chrono::TimeZone;
        match chrono::Local.timestamp_millis_opt(self.timestamp).single() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            None => "-".to_string(),
        }
    }
}

pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((score as f64 / total as f64) * 100.0).round() as u32
    }
}
