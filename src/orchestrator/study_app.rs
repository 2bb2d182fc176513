//! 终端学习应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：创建 LLM 客户端、抽取器、求解器和两个存储
//! 2. **事件分发**：把终端输入转换为控制器操作，再渲染控制器的状态
//! 3. **取消**：外部调用进行中按 Ctrl-C 会重置会话
//!
//! 本模块不做任何业务判断，状态转换全部由 `SessionController` 负责。

use anyhow::Result;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::LlmClient;
use crate::models::{Answer, Document, HistoryEntry, SolvedProblem};
use crate::services::{LlmExtractor, LlmResolver, RoutingExtractor, Tutor};
use crate::storage::{FileHistoryLog, FileSessionStore};
use crate::workflow::{BatchOutcome, Failure, Phase, ResumeOutcome, SessionController};

type Input = Lines<BufReader<Stdin>>;

/// 应用主结构
pub struct App {
    controller: SessionController,
    tutor: Tutor,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，只能处理纯文本文档的抽取");
        }

        let client = LlmClient::new(&config);
        let extractor = RoutingExtractor::new(LlmExtractor::new(client.clone(), &config));
        let resolver = LlmResolver::new(client.clone(), &config);

        let controller = SessionController::new(
            Arc::new(extractor),
            Arc::new(resolver),
            Arc::new(FileSessionStore::new(config.session_path())),
            Arc::new(FileHistoryLog::new(config.history_path())),
            config.batch_size,
        );

        info!("📁 数据目录: {}", config.data_dir);

        Ok(Self {
            tutor: Tutor::new(client, &config),
            controller,
        })
    }

    /// 运行应用主逻辑
    ///
    /// - `study_session <文档>`：扫描新文档（有未完成会话时先询问是否继续）
    /// - `study_session history`：列出历史记录
    /// - `study_session history <id>`：查看某条历史记录
    /// - `study_session history clear`：清空历史记录
    pub async fn run(&self, args: &[String]) -> Result<()> {
        if args.first().map(String::as_str) == Some("history") {
            return self.run_history(args.get(1).map(String::as_str)).await;
        }
        let document_arg = args.first().cloned();

        let mut input = BufReader::new(tokio::io::stdin()).lines();

        if let Some(saved) = self.controller.saved_session() {
            println!(
                "发现未完成的会话：已完成 {}/{} 题。",
                saved.cursor.min(saved.total()),
                saved.total()
            );
            if confirm(&mut input, "是否继续上次的会话？[Y/n] ").await? {
                match self.guarded(self.controller.resume()).await {
                    Some(Ok(ResumeOutcome::AlreadyComplete)) => {
                        println!("🎉 上次的会话已经全部完成。");
                    }
                    Some(Ok(ResumeOutcome::Resumed(_))) => return self.drive(&mut input).await,
                    Some(Err(e)) => println!("无法恢复会话: {}", e),
                    None => return Ok(()),
                }
            }
        }

        let Some(path) = document_arg else {
            println!("用法: study_session <文档路径> | history [<编号> | clear]");
            return Ok(());
        };

        let document = match Document::from_path(Path::new(&path)).await {
            Ok(document) => document,
            Err(e) => {
                println!("{}", e.user_message());
                return Ok(());
            }
        };

        println!("🔍 正在识别题目: {}（每份文档只需一次）", document.name);
        match self.guarded(self.controller.submit_document(document)).await {
            Some(Ok(_)) => self.drive(&mut input).await,
            Some(Err(e)) => {
                println!("{}", e);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn run_history(&self, command: Option<&str>) -> Result<()> {
        match command {
            None => print_history(&self.controller.history()),
            Some("clear") => {
                self.controller.clear_history()?;
                println!("历史记录已清空。");
            }
            Some(raw) => {
                let Ok(id) = raw.trim_start_matches('#').parse::<u64>() else {
                    println!("用法: study_session history [<编号> | clear]");
                    return Ok(());
                };
                match self.controller.review(id).await {
                    Ok(Phase::Reviewing(entry)) => print_entry(&entry),
                    Ok(_) => {}
                    Err(e) => println!("{}", e),
                }
                self.controller.dismiss().await?;
            }
        }
        Ok(())
    }

    /// 根据当前状态循环处理用户输入
    async fn drive(&self, input: &mut Input) -> Result<()> {
        loop {
            match self.controller.phase().await {
                Phase::Presenting(quiz) => {
                    let Some(problem) = quiz.current().cloned() else {
                        self.controller.finish_batch().await?;
                        continue;
                    };
                    print_problem(&problem, quiz.position, quiz.problems.len());

                    // 输入结束：已保存的游标仍指向本批开头，下次从本批开始
                    let Some(line) = input.next_line().await? else {
                        return Ok(());
                    };
                    let line = line.trim();

                    if line.eq_ignore_ascii_case("q") {
                        self.controller.reset().await;
                        println!("已放弃本次会话。");
                        return Ok(());
                    }

                    if let Some(doubt) = line.strip_prefix('?') {
                        self.ask_tutor(&problem, doubt).await;
                        continue;
                    }

                    let answer = parse_answer(line, &problem);
                    print_feedback(&problem, &answer);
                    self.controller.record_answer(answer).await?;
                }
                Phase::Results(outcome) => {
                    print_outcome(&outcome);
                    if confirm(input, "继续下一批？[Y/n] ").await? {
                        println!(
                            "🤖 正在求解第 {}-{} 题...",
                            outcome.cursor + 1,
                            (outcome.cursor + self.controller.batch_size()).min(outcome.cursor + outcome.remaining)
                        );
                        if self.guarded(self.controller.continue_session()).await.is_none() {
                            return Ok(());
                        }
                    } else {
                        self.controller.dismiss().await?;
                        println!("进度已保存，下次可以继续。");
                        return Ok(());
                    }
                }
                Phase::Completed(outcome) => {
                    if let Some(outcome) = outcome {
                        print_outcome(&outcome);
                    }
                    println!("🎉 你已完成本文档中识别出的全部题目！");
                    return Ok(());
                }
                Phase::Failed(failure) => {
                    if !self.handle_failure(input, &failure).await? {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// 返回是否继续循环
    async fn handle_failure(&self, input: &mut Input, failure: &Failure) -> Result<bool> {
        println!("❌ 出错了：{}", failure.message);

        if failure.can_retry() && confirm(input, "是否重试本批？[Y/n] ").await? {
            return Ok(self.guarded(self.controller.retry()).await.is_some());
        }

        self.controller.dismiss().await?;
        if failure.can_retry() {
            println!("进度已保存，下次启动时可以从本批继续。");
        }
        Ok(false)
    }

    async fn ask_tutor(&self, problem: &SolvedProblem, doubt: &str) {
        if doubt.trim().is_empty() {
            println!("请在 ? 后面输入你的问题。");
            return;
        }
        match self.tutor.explain_doubt(problem, doubt).await {
            Ok(reply) => println!("\n👩‍🏫 {}\n", reply),
            Err(e) => {
                warn!("答疑失败: {}", e);
                println!("抱歉，暂时无法回答这个问题。");
            }
        }
    }

    /// 等待外部调用；期间按 Ctrl-C 则重置会话并返回 `None`
    async fn guarded<F, T>(&self, call: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            out = call => Some(out),
            _ = tokio::signal::ctrl_c() => {
                self.controller.reset().await;
                println!("\n已取消。");
                None
            }
        }
    }
}

// ========== 输入解析 ==========

/// 选择题输入选项编号（从 1 开始）；开放题或无法解析时按文本作答
fn parse_answer(line: &str, problem: &SolvedProblem) -> Answer {
    if !problem.choices.is_empty() {
        if let Ok(number) = line.parse::<usize>() {
            if (1..=problem.choices.len()).contains(&number) {
                return Answer::Choice(number - 1);
            }
        }
        if let Some(index) = letter_index(line).filter(|i| *i < problem.choices.len()) {
            return Answer::Choice(index);
        }
    }

    if line.is_empty() {
        Answer::answered()
    } else {
        Answer::Text(line.to_string())
    }
}

/// `a`/`B` → 0/1
fn letter_index(line: &str) -> Option<usize> {
    let mut chars = line.chars();
    let c = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() || !c.is_ascii_lowercase() {
        return None;
    }
    Some((c as u8 - b'a') as usize)
}

async fn confirm(input: &mut Input, prompt: &str) -> Result<bool> {
    println!("{}", prompt);
    let line = input.next_line().await?.unwrap_or_default();
    let line = line.trim().to_lowercase();
    Ok(line.is_empty() || line == "y" || line == "yes" || line == "s" || line == "sim")
}

// ========== 输出 ==========

fn print_problem(problem: &SolvedProblem, position: usize, batch_len: usize) {
    println!("\n{}", "─".repeat(60));
    println!("第 {} 题（本批 {}/{}）", problem.id + 1, position + 1, batch_len);
    println!("{}", "─".repeat(60));
    println!("{}\n", problem.statement);

    if problem.choices.is_empty() {
        println!("（开放题，输入你的答案；直接回车表示已作答）");
    } else {
        for (i, choice) in problem.choices.iter().enumerate() {
            println!("  {}) {}", i + 1, choice);
        }
    }
    println!("输入 ?问题 向老师提问，q 放弃会话");
}

/// 正确选项的展示文本；索引越界时退回参考答案
fn correct_choice_label(problem: &SolvedProblem) -> Option<String> {
    let correct = problem.correct_choice_index?;
    let label = match problem.choices.get(correct) {
        Some(choice) => format!("{}) {}", correct + 1, choice),
        None => problem.reference_answer.clone(),
    };
    Some(label)
}

fn print_feedback(problem: &SolvedProblem, answer: &Answer) {
    match correct_choice_label(problem) {
        Some(label) if problem.is_correct(Some(answer)) => println!("✅ 正确！答案是 {}", label),
        Some(label) => println!("❌ 错误。正确答案是 {}", label),
        None => println!("📝 参考答案: {}", problem.reference_answer),
    }
    println!("\n📖 讲解:\n{}", problem.rationale);
}

fn describe_answer(problem: &SolvedProblem, answer: Option<&Answer>) -> String {
    match answer {
        None => "未作答".to_string(),
        Some(answer) if *answer == Answer::answered() => "已作答".to_string(),
        Some(Answer::Choice(index)) => match problem.choices.get(*index) {
            Some(choice) => format!("{}) {}", index + 1, choice),
            None => format!("选项 {}", index + 1),
        },
        Some(Answer::Text(text)) => text.clone(),
    }
}

fn print_entry(entry: &HistoryEntry) {
    println!("\n{}", "=".repeat(60));
    println!(
        "历史记录 #{}  {}  得分 {}/{}（{}%）",
        entry.id.unwrap_or_default(),
        entry.display_date(),
        entry.score,
        entry.total,
        entry.percentage()
    );
    println!("{}", "=".repeat(60));

    for problem in &entry.problems {
        let answer = entry.answers.get(&problem.id);
        let mark = match problem.correct_choice_index {
            Some(_) if problem.is_correct(answer) => "✅",
            Some(_) => "❌",
            None => "📝",
        };
        println!("\n{} 第 {} 题: {}", mark, problem.id + 1, problem.statement);
        println!("   你的答案: {}", describe_answer(problem, answer));
        match correct_choice_label(problem) {
            Some(label) => println!("   正确答案: {}", label),
            None => println!("   参考答案: {}", problem.reference_answer),
        }
    }
}

fn print_outcome(outcome: &BatchOutcome) {
    println!("\n{}", "=".repeat(60));
    println!(
        "📊 本批得分: {}/{}（{}%）",
        outcome.score, outcome.total, outcome.percentage
    );
    println!("进度: {} 题已完成，剩余 {} 题", outcome.cursor, outcome.remaining);
    println!("{}", "=".repeat(60));
}

fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("暂无历史记录。");
        return;
    }
    for entry in entries {
        println!(
            "#{:<4} {}  {}/{}（{}%）",
            entry.id.unwrap_or_default(),
            entry.display_date(),
            entry.score,
            entry.total,
            entry.percentage()
        );
    }
}
