//! 批次求解服务 - 业务能力层
//!
//! 给定一段连续的描述符和它的起始偏移，产出完整求解后的题目
//!
//! 约定：
//! - `result.len() <= batch.len()`，保持相对顺序
//! - `result[i].id == start_offset + i`
//! - 不做任何重试，由调用方决定是否重试同一批次

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::infrastructure::LlmClient;
use crate::models::{ProblemDescriptor, SolvedProblem};
use crate::services::json_output::parse_json_array;
use crate::utils::truncate_text;

/// 求解能力
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        batch: &[ProblemDescriptor],
        start_offset: usize,
    ) -> Result<Vec<SolvedProblem>, PipelineError>;
}

/// 推理服务返回的单道题目（未规范化）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSolved {
    text: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    correct_answer_index: Option<i64>,
    #[serde(default)]
    correct_answer_text: String,
    #[serde(default)]
    explanation: String,
}

/// 规范化正确答案索引
///
/// 缺失、`-1` 等负数、超出选项范围、或没有选项时一律视为开放题（`None`）。
pub fn normalize_choice_index(raw: Option<i64>, choice_count: usize) -> Option<usize> {
    let index = usize::try_from(raw?).ok()?;
    if index < choice_count {
        Some(index)
    } else {
        None
    }
}

/// 解析求解结果
///
/// - 顶层不是数组 → `MalformedOutput`
/// - 空响应或没有任何可用条目 → `Resolution`
/// - 单个条目无法解析时丢弃，超出批次长度的条目截断
pub fn parse_solved_batch(
    response: &str,
    batch_len: usize,
    start_offset: usize,
) -> Result<Vec<SolvedProblem>, PipelineError> {
    if response.trim().is_empty() {
        return Err(PipelineError::Resolution("推理服务返回了空内容".to_string()));
    }

    let items = parse_json_array(response).map_err(|e| {
        warn!("无法解析求解结果: {} | 响应: {}", e, truncate_text(response, 200));
        PipelineError::MalformedOutput(e)
    })?;

    let problems: Vec<SolvedProblem> = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value::<RawSolved>(item) {
            Ok(raw) if !raw.text.trim().is_empty() => Some(raw),
            Ok(_) => {
                warn!("跳过题干为空的条目 {}", position);
                None
            }
            Err(e) => {
                warn!("跳过无法解析的条目 {}: {}", position, e);
                None
            }
        })
        .take(batch_len)
        .enumerate()
        .map(|(i, raw)| {
            let choices = raw.options.unwrap_or_default();
            let correct_choice_index = normalize_choice_index(raw.correct_answer_index, choices.len());
            if raw.correct_answer_index.unwrap_or(-1) >= 0 && correct_choice_index.is_none() {
                warn!(
                    "题目 {} 的正确答案索引 {:?} 超出选项范围，按开放题处理",
                    start_offset + i + 1,
                    raw.correct_answer_index
                );
            }
            SolvedProblem {
                id: (start_offset + i) as u64,
                statement: raw.text,
                choices,
                correct_choice_index,
                reference_answer: raw.correct_answer_text,
                rationale: raw.explanation,
            }
        })
        .collect();

    if problems.is_empty() {
        return Err(PipelineError::Resolution(
            "推理服务没有返回任何可用的题目".to_string(),
        ));
    }

    Ok(problems)
}

// ========== LLM 求解 ==========

const SOLVE_SYSTEM_PROMPT: &str = "你是一位耐心的专业辅导老师，负责为学生逐题讲解。只返回严格的 JSON。";

/// 基于推理服务的求解器
pub struct LlmResolver {
    client: LlmClient,
    model_name: String,
}

impl LlmResolver {
    pub fn new(client: LlmClient, config: &Config) -> Self {
        Self {
            client,
            model_name: config.solve_model_name.clone(),
        }
    }

    fn build_prompt(batch: &[ProblemDescriptor]) -> String {
        let problems: Vec<String> = batch
            .iter()
            .map(|d| format!("### 题目 {}\n{}", d.sequence_id + 1, d.raw_content))
            .collect();

        format!(
            r#"依次求解下面的 {count} 道题目，每道题输出一个对象，顺序与输入一致：
{{
  "text": "题干（Markdown，数学表达式放在 $...$ 中）",
  "options": ["选项内容", ...]（开放题为空数组）,
  "correctAnswerIndex": 正确选项的索引（从 0 开始；开放题为 -1）,
  "correctAnswerText": "最终答案",
  "explanation": "分步讲解：先列出已知条件，再说明用到的理论或公式，然后逐步计算，最后说明如何得到正确选项"
}}

规则：
1. 使用与题目相同的语言作答。
2. 所有数学表达式必须写成 LaTeX 并放在 $...$ 中，JSON 中的反斜杠需要转义（\\frac）。
3. 只返回包含 {count} 个对象的 JSON 数组。

{problems}"#,
            count = batch.len(),
            problems = problems.join("\n\n")
        )
    }
}

#[async_trait]
impl Resolver for LlmResolver {
    async fn resolve(
        &self,
        batch: &[ProblemDescriptor],
        start_offset: usize,
    ) -> Result<Vec<SolvedProblem>, PipelineError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "🤖 正在求解第 {}-{} 题...",
            start_offset + 1,
            start_offset + batch.len()
        );

        let prompt = Self::build_prompt(batch);
        let response = self
            .client
            .send_to_llm(&self.model_name, &prompt, Some(SOLVE_SYSTEM_PROMPT), None)
            .await
            .map_err(|e| PipelineError::Resolution(format!("推理服务调用失败: {}", e)))?;

        let problems = parse_solved_batch(&response, batch.len(), start_offset)?;
        if problems.len() < batch.len() {
            warn!(
                "⚠️ 本批请求 {} 道题，只得到 {} 道",
                batch.len(),
                problems.len()
            );
        }
        Ok(problems)
    }
}
