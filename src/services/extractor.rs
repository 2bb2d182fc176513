//! 题目抽取服务 - 业务能力层
//!
//! 把一份文档一次性转换为有序的 `ProblemDescriptor` 列表
//!
//! - `LlmExtractor`：把整份文档交给推理服务，要求内联图表的文字描述
//! - `TextExtractor`：纯文本文档，按行首题号切分
//! - `RoutingExtractor`：按 MIME 类型选择上面两者之一

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::infrastructure::LlmClient;
use crate::models::{Document, ProblemDescriptor};
use crate::services::json_output::parse_json_array;

/// 抽取能力
#[async_trait]
pub trait Extractor: Send + Sync {
    /// 抽取文档中的全部题目
    ///
    /// 成功时至少返回一个描述符，`sequence_id` 为 `0..N-1`。
    async fn extract(&self, document: &Document) -> Result<Vec<ProblemDescriptor>, PipelineError>;
}

/// 为抽取结果分配稠密的 `sequence_id`
///
/// 丢弃内容为空的条目；`source_index` 保留抽取器自己的编号。
pub fn assign_sequence_ids(
    raw: impl IntoIterator<Item = (usize, String)>,
) -> Vec<ProblemDescriptor> {
    raw.into_iter()
        .map(|(source_index, content)| (source_index, content.trim().to_string()))
        .filter(|(_, content)| !content.is_empty())
        .enumerate()
        .map(|(sequence_id, (source_index, content))| {
            ProblemDescriptor::new(sequence_id, source_index, content)
        })
        .collect()
}

fn non_empty(
    descriptors: Vec<ProblemDescriptor>,
    document: &Document,
) -> Result<Vec<ProblemDescriptor>, PipelineError> {
    if descriptors.is_empty() {
        return Err(PipelineError::Extraction(format!(
            "文档 {} 中没有识别出任何题目",
            document.name
        )));
    }
    Ok(descriptors)
}

// ========== LLM 抽取 ==========

const EXTRACT_SYSTEM_PROMPT: &str = "你是一个试卷结构分析助手，负责把试卷拆分为独立的题目。只返回严格的 JSON。";

const EXTRACT_USER_PROMPT: &str = r#"按顺序通读附件中的整份试卷，把其中的每一道题目单独列出。

要求：
1. 每道题输出一个对象：{"index": 题号(整数), "content": "题目完整内容"}。
2. content 必须包含题干和全部选项，保持原文语言。
3. 如果题目附近有图片、图表、表格或几何图形，必须在 content 中用文字完整描述它们（坐标、数值、标注、形状），因为之后求解时看不到原文件。
4. 数学表达式使用 LaTeX，并放在 $...$ 中。
5. 不要解题，不要遗漏题目，不要输出题目以外的内容。

只返回 JSON 数组。"#;

#[derive(Debug, Deserialize)]
struct RawExtracted {
    #[serde(default, alias = "originalIndex")]
    index: Option<usize>,
    #[serde(default)]
    content: String,
}

/// 基于推理服务的抽取器
pub struct LlmExtractor {
    client: LlmClient,
    model_name: String,
}

impl LlmExtractor {
    pub fn new(client: LlmClient, config: &Config) -> Self {
        Self {
            client,
            model_name: config.extract_model_name.clone(),
        }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, document: &Document) -> Result<Vec<ProblemDescriptor>, PipelineError> {
        info!("🔍 正在识别文档中的题目: {}", document.name);

        let response = self
            .client
            .send_to_llm(
                &self.model_name,
                EXTRACT_USER_PROMPT,
                Some(EXTRACT_SYSTEM_PROMPT),
                Some(document),
            )
            .await
            .map_err(|e| PipelineError::Extraction(format!("推理服务调用失败: {}", e)))?;

        let descriptors = parse_extraction(&response)?;
        info!("✓ 识别出 {} 道题目", descriptors.len());
        non_empty(descriptors, document)
    }
}

/// 解析抽取结果
fn parse_extraction(response: &str) -> Result<Vec<ProblemDescriptor>, PipelineError> {
    let items = parse_json_array(response)
        .map_err(|e| PipelineError::Extraction(format!("无法解析抽取结果: {}", e)))?;

    let total = items.len();
    let raw: Vec<(usize, String)> = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value::<RawExtracted>(item) {
            Ok(raw) => Some((raw.index.unwrap_or(position + 1), raw.content)),
            Err(e) => {
                warn!("跳过无法解析的题目条目 {}: {}", position, e);
                None
            }
        })
        .collect();

    let descriptors = assign_sequence_ids(raw);
    if descriptors.len() < total {
        debug!("抽取结果中有 {} 条被丢弃", total - descriptors.len());
    }
    Ok(descriptors)
}

// ========== 纯文本抽取 ==========

/// 行首题号：`1.`、`2)`、`Questão 3`、`Question 4`、`Q5`
const MARKER_PATTERN: &str =
    r"(?mi)^[ \t]*(?:(?:quest(?:ão|ao|ion)|q)[ \t]*(\d+)[ \t]*[:.)\-]?|(\d+)[.)])\s+";

/// 纯文本抽取器
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 按题号切分文本；第一个题号之前的内容（标题、说明）被忽略
    pub fn split(&self, text: &str) -> Result<Vec<ProblemDescriptor>, PipelineError> {
        let re = Regex::new(MARKER_PATTERN)
            .map_err(|e| PipelineError::Extraction(format!("题号规则无效: {}", e)))?;

        let markers: Vec<(usize, usize, Option<usize>)> = re
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|m| m.as_str().parse().ok());
                Some((whole.start(), whole.end(), number))
            })
            .collect();

        let raw = markers.iter().enumerate().map(|(i, (_, content_start, number))| {
            let content_end = markers
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(text.len());
            (
                number.unwrap_or(i + 1),
                text[*content_start..content_end].to_string(),
            )
        });

        Ok(assign_sequence_ids(raw))
    }
}

#[async_trait]
impl Extractor for TextExtractor {
    async fn extract(&self, document: &Document) -> Result<Vec<ProblemDescriptor>, PipelineError> {
        let text = std::str::from_utf8(&document.bytes).map_err(|e| {
            PipelineError::Extraction(format!("文档 {} 不是有效的 UTF-8 文本: {}", document.name, e))
        })?;

        let descriptors = self.split(text)?;
        info!("✓ 从文本中切分出 {} 道题目", descriptors.len());
        non_empty(descriptors, document)
    }
}

// ========== 路由 ==========

/// 纯文本走本地切分，其余交给推理服务
pub struct RoutingExtractor {
    text: TextExtractor,
    llm: LlmExtractor,
}

impl RoutingExtractor {
    pub fn new(llm: LlmExtractor) -> Self {
        Self {
            text: TextExtractor::new(),
            llm,
        }
    }
}

#[async_trait]
impl Extractor for RoutingExtractor {
    async fn extract(&self, document: &Document) -> Result<Vec<ProblemDescriptor>, PipelineError> {
        if document.is_text() {
            self.text.extract(document).await
        } else {
            self.llm.extract(document).await
        }
    }
}
