use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::problem::ProblemDescriptor;

/// 可恢复的批次会话状态（会话存储的持久化单元）
///
/// 不变量：`0 <= cursor <= descriptors.len()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSessionState {
    pub descriptors: Vec<ProblemDescriptor>,
    /// 下一道未求解题目的 sequence_id
    pub cursor: usize,
    /// 毫秒时间戳
    pub last_updated: i64,
}

impl BatchSessionState {
    /// 新会话，游标从 0 开始
    pub fn new(descriptors: Vec<ProblemDescriptor>) -> Self {
        Self {
            descriptors,
            cursor: 0,
            last_updated: now_millis(),
        }
    }

    pub fn total(&self) -> usize {
        self.descriptors.len()
    }

    pub fn remaining(&self) -> usize {
        self.total().saturating_sub(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.total()
    }

    /// 下一批的范围 `[cursor, min(cursor + batch_size, len))`；已到末尾时返回 `None`
    pub fn next_batch(&self, batch_size: usize) -> Option<Range<usize>> {
        if self.is_complete() {
            return None;
        }
        let end = (self.cursor + batch_size.max(1)).min(self.total());
        Some(self.cursor..end)
    }

    /// 取出某个范围内的描述符
    pub fn slice(&self, range: &Range<usize>) -> &[ProblemDescriptor] {
        let end = range.end.min(self.total());
        let start = range.start.min(end);
        &self.descriptors[start..end]
    }

    /// 推进游标，返回新的状态值（游标不会越过末尾）
    pub fn advanced(&self, solved: usize) -> Self {
        Self {
            descriptors: self.descriptors.clone(),
            cursor: (self.cursor + solved).min(self.total()),
            last_updated: now_millis(),
        }
    }

    /// 从持久化数据恢复时的合法性检查：`sequence_id` 必须为 `0..N-1`
    ///
    /// 游标越过末尾不算损坏，这样的会话按"已完成"处理。
    pub fn is_valid(&self) -> bool {
        self.descriptors
            .iter()
            .enumerate()
            .all(|(i, d)| d.sequence_id == i)
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
