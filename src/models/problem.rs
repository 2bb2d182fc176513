use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 题目描述符（抽取阶段的产物）
///
/// `raw_content` 必须包含求解所需的全部信息（包括图表的文字描述），
/// 求解阶段不会再看到原始文档。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDescriptor {
    /// 文档顺序的稠密编号，从 0 开始
    pub sequence_id: usize,
    /// 抽取器自己的编号，可能稀疏或乱序
    pub source_index: usize,
    pub raw_content: String,
}

impl ProblemDescriptor {
    pub fn new(sequence_id: usize, source_index: usize, raw_content: impl Into<String>) -> Self {
        Self {
            sequence_id,
            source_index,
            raw_content: raw_content.into(),
        }
    }
}

/// 已求解的题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedProblem {
    /// 全局序号 = 批次起始偏移 + 批内索引
    pub id: u64,
    pub statement: String,
    #[serde(default)]
    pub choices: Vec<String>,
    /// `None` 表示开放题
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_choice_index: Option<usize>,
    pub reference_answer: String,
    pub rationale: String,
}

impl SolvedProblem {
    /// 是否为选择题（有选项且有正确答案索引）
    pub fn is_multiple_choice(&self) -> bool {
        !self.choices.is_empty() && self.correct_choice_index.is_some()
    }

    /// 判断作答是否正确；开放题永远返回 false
    pub fn is_correct(&self, answer: Option<&Answer>) -> bool {
        match (self.correct_choice_index, answer) {
            (Some(expected), Some(Answer::Choice(given))) => expected == *given,
            _ => false,
        }
    }
}

/// 学习者的作答：选择题为选项索引，开放题为文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(usize),
    Text(String),
}

impl Answer {
    /// 开放题的默认作答标记
    pub fn answered() -> Self {
        Answer::Text("Answered".to_string())
    }
}

/// 当前批次的作答记录，按 `SolvedProblem::id` 索引
pub type AnswerRecord = BTreeMap<u64, Answer>;

/// 计算一个批次的得分
///
/// 返回 `(score, total)`。没有正确答案索引的题目不计入得分，但计入总数。
pub fn score_batch(problems: &[SolvedProblem], answers: &AnswerRecord) -> (usize, usize) {
    let score = problems
        .iter()
        .filter(|p| p.is_correct(answers.get(&p.id)))
        .count();
    (score, problems.len())
}
