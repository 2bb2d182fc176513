//! 答疑服务 - 业务能力层
//!
//! 针对某一道已求解的题目回答学生的追问，不参与状态机

use anyhow::Result;
use tracing::debug;

use crate::config::Config;
use crate::infrastructure::LlmClient;
use crate::models::SolvedProblem;

const FALLBACK_REPLY: &str = "抱歉，暂时无法回答这个问题，请稍后再试。";

/// 答疑服务
pub struct Tutor {
    client: LlmClient,
    model_name: String,
}

impl Tutor {
    pub fn new(client: LlmClient, config: &Config) -> Self {
        Self {
            client,
            model_name: config.tutor_model_name.clone(),
        }
    }

    /// 回答关于某道题的疑问
    pub async fn explain_doubt(&self, problem: &SolvedProblem, doubt: &str) -> Result<String> {
        debug!("答疑: 题目 {}", problem.id + 1);

        let prompt = build_doubt_prompt(problem, doubt);
        let reply = self
            .client
            .send_to_llm(&self.model_name, &prompt, None, None)
            .await?;

        if reply.is_empty() {
            Ok(FALLBACK_REPLY.to_string())
        } else {
            Ok(reply)
        }
    }
}

fn build_doubt_prompt(problem: &SolvedProblem, doubt: &str) -> String {
    let number = problem.id + 1;
    format!(
        r#"你是一位辅导老师，只讨论第 {number} 题。

要求：
1. 明确你讨论的是第 {number} 题。
2. 只回答与这道题及其相关知识有关的问题。
3. 数学表达式使用 LaTeX（$...$）。
4. 耐心、循序渐进，使用与学生相同的语言。

--- 第 {number} 题 ---
题干: {statement}
原讲解: {rationale}
------------------------

学生的疑问: "{doubt}"

回答："#,
        number = number,
        statement = problem.statement,
        rationale = problem.rationale,
        doubt = doubt.trim()
    )
}
