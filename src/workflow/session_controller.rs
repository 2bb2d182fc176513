//! 批次会话控制器 - 流程层
//!
//! 核心职责：驱动"抽取 → 逐批求解 → 完成"的状态机
//!
//! - 同一时间最多只有一个外部调用（抽取或求解）在进行，重复触发直接拒绝
//! - 外部调用期间不持有锁，`reset()` 随时可用
//! - 每次 `reset()` 递增会话纪元（epoch），属于旧纪元的调用结果一律丢弃
//! - 游标或描述符每次变化后立即写入会话存储

use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{ControllerError, ControllerResult, PipelineError};
use crate::models::{
    score_batch, Answer, BatchSessionState, Document, HistoryEntry, ProblemDescriptor,
    SolvedProblem,
};
use crate::services::{Extractor, Resolver};
use crate::storage::{HistoryLog, SessionStore};
use crate::utils::logging;
use crate::workflow::phase::{BatchOutcome, BatchQuiz, Failure, FailureStage, Phase};

/// 恢复会话的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// 已从保存的游标继续（求解成功进入答题，或失败进入 Failed）
    Resumed(Phase),
    /// 保存的会话已经全部完成，未调用求解服务
    AlreadyComplete,
}

/// 本次会话的累计成绩（仅用于日志）
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    score: usize,
    total: usize,
    batches: usize,
}

struct Shared {
    phase: Phase,
    session: Option<BatchSessionState>,
    epoch: u64,
    tally: Tally,
}

/// 一次待执行的求解
struct ResolveJob {
    epoch: u64,
    bounds: Range<usize>,
    total: usize,
    batch: Vec<ProblemDescriptor>,
}

/// 批次会话控制器
///
/// 可以 `clone()`，所有副本共享同一个状态机。
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Mutex<Shared>>,
    extractor: Arc<dyn Extractor>,
    resolver: Arc<dyn Resolver>,
    session_store: Arc<dyn SessionStore>,
    history: Arc<dyn HistoryLog>,
    batch_size: usize,
}

impl SessionController {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        resolver: Arc<dyn Resolver>,
        session_store: Arc<dyn SessionStore>,
        history: Arc<dyn HistoryLog>,
        batch_size: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                phase: Phase::Idle,
                session: None,
                epoch: 0,
                tally: Tally::default(),
            })),
            extractor,
            resolver,
            session_store,
            history,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 当前状态快照
    pub async fn phase(&self) -> Phase {
        self.shared.lock().await.phase.clone()
    }

    /// 可恢复的会话（Idle 时展示"继续上次"入口）
    ///
    /// 游标已到末尾或没有题目的会话也会返回，由 `resume()` 报告"已完成"。
    pub fn saved_session(&self) -> Option<BatchSessionState> {
        self.session_store.load()
    }

    // ========== 抽取 ==========

    /// 提交新文档：抽取全部题目，然后自动求解第一批
    pub async fn submit_document(&self, document: Document) -> ControllerResult<Phase> {
        let epoch = {
            let mut shared = self.shared.lock().await;
            match &shared.phase {
                p if p.is_pending() => return Err(ControllerError::Busy { phase: p.name() }),
                Phase::Idle | Phase::Completed(_) => {}
                p => {
                    return Err(ControllerError::InvalidTransition {
                        action: "submit_document",
                        phase: p.name(),
                    })
                }
            }
            shared.phase = Phase::Scanning {
                document: document.name.clone(),
            };
            shared.session = None;
            shared.tally = Tally::default();
            shared.epoch
        };

        logging::log_session_start(&document.name, self.batch_size);

        let result = self.extractor.extract(&document).await;

        let job = {
            let mut shared = self.shared.lock().await;
            if shared.epoch != epoch {
                info!("会话已被放弃，丢弃抽取结果: {}", document.name);
                return Ok(shared.phase.clone());
            }

            let descriptors = match result {
                Ok(descriptors) if descriptors.is_empty() => {
                    return Ok(self.fail(
                        &mut shared,
                        FailureStage::Scanning,
                        PipelineError::Extraction("没有识别出任何题目".to_string()),
                    ))
                }
                Ok(descriptors) => descriptors,
                Err(e) => return Ok(self.fail(&mut shared, FailureStage::Scanning, e)),
            };

            let state = BatchSessionState::new(descriptors);
            if !state.is_valid() {
                return Ok(self.fail(
                    &mut shared,
                    FailureStage::Scanning,
                    PipelineError::Extraction("题目编号不连续".to_string()),
                ));
            }

            info!("✓ 文档 {} 共识别出 {} 道题目", document.name, state.total());
            self.persist(&state);
            shared.session = Some(state);

            match self.begin_resolving(&mut shared) {
                Some(job) => job,
                None => return Ok(shared.phase.clone()),
            }
        };

        Ok(self.run_resolve(job).await)
    }

    // ========== 恢复 / 继续 / 重试 ==========

    /// 从保存的会话继续
    ///
    /// 游标已到末尾时不调用求解服务，直接报告"已完成"并清除会话。
    pub async fn resume(&self) -> ControllerResult<ResumeOutcome> {
        let job = {
            let mut shared = self.shared.lock().await;
            match &shared.phase {
                p if p.is_pending() => return Err(ControllerError::Busy { phase: p.name() }),
                Phase::Idle => {}
                p => {
                    return Err(ControllerError::InvalidTransition {
                        action: "resume",
                        phase: p.name(),
                    })
                }
            }

            let state = self.saved_session().ok_or(ControllerError::NoSavedSession)?;
            shared.tally = Tally::default();

            if state.is_complete() {
                info!("保存的会话已全部完成（{} 道题）", state.total());
                self.clear_persisted();
                shared.session = None;
                shared.phase = Phase::Completed(None);
                return Ok(ResumeOutcome::AlreadyComplete);
            }

            info!(
                "↩️ 恢复会话: 进度 {}/{}",
                state.cursor,
                state.total()
            );
            shared.session = Some(state);

            match self.begin_resolving(&mut shared) {
                Some(job) => job,
                None => return Ok(ResumeOutcome::AlreadyComplete),
            }
        };

        Ok(ResumeOutcome::Resumed(self.run_resolve(job).await))
    }

    /// 结果页"下一批"
    pub async fn continue_session(&self) -> ControllerResult<Phase> {
        let job = {
            let mut shared = self.shared.lock().await;
            match &shared.phase {
                Phase::Results(_) => {}
                p if p.is_pending() => return Err(ControllerError::Busy { phase: p.name() }),
                p => {
                    return Err(ControllerError::InvalidTransition {
                        action: "continue_session",
                        phase: p.name(),
                    })
                }
            }
            match self.begin_resolving(&mut shared) {
                Some(job) => job,
                None => return Ok(shared.phase.clone()),
            }
        };

        Ok(self.run_resolve(job).await)
    }

    /// 求解失败后用同一游标重试
    pub async fn retry(&self) -> ControllerResult<Phase> {
        let job = {
            let mut shared = self.shared.lock().await;
            match &shared.phase {
                Phase::Failed(failure) if failure.can_retry() => {}
                p if p.is_pending() => return Err(ControllerError::Busy { phase: p.name() }),
                p => {
                    return Err(ControllerError::InvalidTransition {
                        action: "retry",
                        phase: p.name(),
                    })
                }
            }

            if shared.session.is_none() {
                shared.session = Some(self.saved_session().ok_or(ControllerError::NoSavedSession)?);
            }

            match self.begin_resolving(&mut shared) {
                Some(job) => job,
                None => return Ok(shared.phase.clone()),
            }
        };

        info!("🔁 重试第 {}-{} 题", job.bounds.start + 1, job.bounds.end);
        Ok(self.run_resolve(job).await)
    }

    // ========== 答题 ==========

    /// 记录当前题目的作答并前进；答完最后一题时结束本批
    pub async fn record_answer(&self, answer: Answer) -> ControllerResult<Phase> {
        let mut shared = self.shared.lock().await;
        let finished = match &mut shared.phase {
            Phase::Presenting(quiz) => quiz.answer_current(answer),
            p => {
                return Err(ControllerError::InvalidTransition {
                    action: "record_answer",
                    phase: p.name(),
                })
            }
        };

        if finished {
            self.finish(&mut shared);
        }
        Ok(shared.phase.clone())
    }

    /// 提前结束本批，未作答的题目记 0 分
    pub async fn finish_batch(&self) -> ControllerResult<Phase> {
        let mut shared = self.shared.lock().await;
        if !matches!(shared.phase, Phase::Presenting(_)) {
            return Err(ControllerError::InvalidTransition {
                action: "finish_batch",
                phase: shared.phase.name(),
            });
        }
        self.finish(&mut shared);
        Ok(shared.phase.clone())
    }

    // ========== 历史 ==========

    /// 查看历史记录（只读）
    pub async fn review(&self, history_id: u64) -> ControllerResult<Phase> {
        let mut shared = self.shared.lock().await;
        match &shared.phase {
            p if p.is_pending() => return Err(ControllerError::Busy { phase: p.name() }),
            p @ (Phase::Completed(_) | Phase::Failed(_)) => {
                return Err(ControllerError::InvalidTransition {
                    action: "review",
                    phase: p.name(),
                })
            }
            _ => {}
        }

        let entry = self
            .history
            .get(history_id)
            .ok_or(ControllerError::HistoryEntryNotFound(history_id))?;

        // 离开答题界面时本批作答作废，保存的游标不变
        shared.session = None;
        shared.phase = Phase::Reviewing(entry);
        Ok(shared.phase.clone())
    }

    /// 历史记录，最新的在前
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.list()
    }

    pub fn clear_history(&self) -> ControllerResult<()> {
        self.history.clear()?;
        info!("🗑️ 历史记录已清空");
        Ok(())
    }

    // ========== 离开 / 重置 ==========

    /// 回到 Idle，不影响保存的会话
    pub async fn dismiss(&self) -> ControllerResult<Phase> {
        let mut shared = self.shared.lock().await;
        match &shared.phase {
            p if p.is_pending() => return Err(ControllerError::Busy { phase: p.name() }),
            p @ Phase::Presenting(_) => {
                return Err(ControllerError::InvalidTransition {
                    action: "dismiss",
                    phase: p.name(),
                })
            }
            _ => {}
        }
        shared.session = None;
        shared.phase = Phase::Idle;
        Ok(Phase::Idle)
    }

    /// 放弃当前会话：清除保存的会话并回到 Idle
    ///
    /// 任何状态下都可调用；进行中的外部调用结果会被丢弃。
    pub async fn reset(&self) -> Phase {
        let mut shared = self.shared.lock().await;
        if shared.phase.is_pending() {
            warn!("⚠️ 请求进行中被重置，结果将被丢弃");
        }
        shared.epoch += 1;
        shared.session = None;
        shared.tally = Tally::default();
        shared.phase = Phase::Idle;
        self.clear_persisted();
        info!("会话已重置");
        Phase::Idle
    }

    // ========== 内部 ==========

    /// 取出下一批并进入 Resolving；游标已到末尾时直接进入 Completed
    fn begin_resolving(&self, shared: &mut Shared) -> Option<ResolveJob> {
        let Some(state) = shared.session.as_ref() else {
            warn!("没有活动会话，无法求解");
            shared.phase = Phase::Idle;
            return None;
        };

        let Some(bounds) = state.next_batch(self.batch_size) else {
            info!("所有题目均已完成");
            self.clear_persisted();
            shared.session = None;
            shared.phase = Phase::Completed(None);
            return None;
        };

        let total = state.total();
        let batch = state.slice(&bounds).to_vec();
        shared.phase = Phase::Resolving {
            bounds: bounds.clone(),
            total,
        };

        Some(ResolveJob {
            epoch: shared.epoch,
            bounds,
            total,
            batch,
        })
    }

    /// 执行求解（不持有锁），然后应用结果
    async fn run_resolve(&self, job: ResolveJob) -> Phase {
        logging::log_batch_start(job.bounds.start, job.bounds.end, job.total);

        let result = self.resolver.resolve(&job.batch, job.bounds.start).await;

        let mut shared = self.shared.lock().await;
        if shared.epoch != job.epoch {
            info!(
                "会话已被放弃，丢弃第 {}-{} 题的求解结果",
                job.bounds.start + 1,
                job.bounds.end
            );
            return shared.phase.clone();
        }

        match result.and_then(|problems| check_resolved(problems, &job)) {
            Ok(problems) => {
                info!(
                    "✓ 第 {}-{} 题求解完成，共 {} 道",
                    job.bounds.start + 1,
                    job.bounds.end,
                    problems.len()
                );
                shared.phase = Phase::Presenting(BatchQuiz::new(job.bounds.start, job.total, problems));
                shared.phase.clone()
            }
            Err(e) => self.fail(&mut shared, FailureStage::Resolving, e),
        }
    }

    /// 结束本批：计分、写历史、推进游标、保存
    fn finish(&self, shared: &mut Shared) {
        let quiz = match std::mem::replace(&mut shared.phase, Phase::Idle) {
            Phase::Presenting(quiz) => quiz,
            other => {
                shared.phase = other;
                return;
            }
        };

        let (score, total) = score_batch(&quiz.problems, &quiz.answers);

        let entry = HistoryEntry::new(score, total, quiz.problems.clone(), quiz.answers.clone());
        let history_id = match self.history.append(entry) {
            Ok(id) => Some(id),
            Err(e) => {
                error!("❌ 写入历史记录失败: {}", e);
                None
            }
        };

        let Some(state) = shared.session.as_ref() else {
            warn!("没有活动会话，批次结果未推进游标");
            shared.phase = Phase::Completed(Some(BatchOutcome::new(
                quiz.start, score, total, history_id, quiz.start, 0,
            )));
            return;
        };

        let next = state.advanced(quiz.problems.len());
        let outcome = BatchOutcome::new(
            quiz.start,
            score,
            total,
            history_id,
            next.cursor,
            next.remaining(),
        );

        shared.tally.score += score;
        shared.tally.total += total;
        shared.tally.batches += 1;
        logging::log_batch_complete(quiz.start, score, total, next.cursor, next.total());

        self.persist(&next);

        if next.is_complete() {
            self.clear_persisted();
            shared.session = None;
            logging::print_final_stats(shared.tally.score, shared.tally.total, shared.tally.batches);
            shared.phase = Phase::Completed(Some(outcome));
        } else {
            shared.session = Some(next);
            shared.phase = Phase::Results(outcome);
        }
    }

    fn fail(&self, shared: &mut Shared, stage: FailureStage, error: PipelineError) -> Phase {
        error!("❌ {:?} 阶段失败: {}", stage, error);
        shared.phase = Phase::Failed(Failure::new(stage, error));
        shared.phase.clone()
    }

    fn persist(&self, state: &BatchSessionState) {
        if let Err(e) = self.session_store.save(state) {
            error!("❌ 保存会话失败: {}", e);
        }
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.session_store.clear() {
            error!("❌ 清除会话失败: {}", e);
        }
    }
}

/// 校验求解结果是否满足约定：非空、不超过批次长度、id 连续
fn check_resolved(
    problems: Vec<SolvedProblem>,
    job: &ResolveJob,
) -> Result<Vec<SolvedProblem>, PipelineError> {
    if problems.is_empty() {
        return Err(PipelineError::Resolution(
            "求解服务没有返回任何题目".to_string(),
        ));
    }
    if problems.len() > job.batch.len() {
        return Err(PipelineError::MalformedOutput(format!(
            "请求 {} 道题，返回了 {} 道",
            job.batch.len(),
            problems.len()
        )));
    }
    let ids_ok = problems
        .iter()
        .enumerate()
        .all(|(i, p)| p.id == (job.bounds.start + i) as u64);
    if !ids_ok {
        return Err(PipelineError::MalformedOutput(format!(
            "题目 id 与起始偏移 {} 不一致",
            job.bounds.start
        )));
    }
    Ok(problems)
}
