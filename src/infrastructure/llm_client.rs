//! LLM 客户端 - 基础设施层
//!
//! 持有唯一的推理服务连接，只暴露"发送请求、拿回文本"的能力
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（Gemini 的 OpenAI 兼容端点等）
//! - 文档以 `data:<mime>;base64,...` URL 的形式附加到用户消息

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use base64::Engine;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::Document;

/// LLM 客户端
///
/// 职责：
/// - 持有 async-openai 的 Client
/// - 不认识 ProblemDescriptor / SolvedProblem
/// - 不处理业务流程
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `model`: 模型名称
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `document`: 附加的文档（可选），以 data URL 的形式追加到用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        model: &str,
        user_message: &str,
        system_message: Option<&str>,
        document: Option<&Document>,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match document {
            Some(doc) => {
                debug!("附加文档 {} ({}, {} 字节)", doc.name, doc.mime_type, doc.bytes.len());

                let content_parts = vec![
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: to_data_url(doc),
                                detail: Some(ImageDetail::High),
                            },
                        },
                    ),
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: user_message.to_string(),
                        },
                    ),
                ];

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()?
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

fn to_data_url(doc: &Document) -> String {
    format!(
        "data:{};base64,{}",
        doc.mime_type,
        base64::engine::general_purpose::STANDARD.encode(&doc.bytes)
    )
}
