use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use study_session::error::{ControllerError, PipelineError};
use study_session::models::{Answer, BatchSessionState, Document, ProblemDescriptor, SolvedProblem};
use study_session::services::extractor::assign_sequence_ids;
use study_session::services::{Extractor, Resolver};
use study_session::storage::{
    FileHistoryLog, FileSessionStore, HistoryLog, MemoryHistoryLog, MemorySessionStore,
    SessionStore,
};
use study_session::workflow::{FailureStage, Phase, ResumeOutcome, SessionController};

// ========== 测试替身 ==========

/// 按给定内容返回描述符；`source_index` 故意设为稀疏
struct ScriptedExtractor {
    contents: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    fn new(contents: Vec<String>) -> Self {
        Self {
            contents,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn numbered(n: usize) -> Self {
        Self::new((0..n).map(|i| format!("Questão {}", i + 1)).collect())
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, _document: &Document) -> Result<Vec<ProblemDescriptor>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Extraction("arquivo ilegível".into()));
        }
        Ok(assign_sequence_ids(
            self.contents
                .iter()
                .enumerate()
                .map(|(i, c)| (i * 10 + 1, c.clone())),
        ))
    }
}

/// 每道题两个选项，正确答案为 0；内容含 "open" 的题目为开放题
#[derive(Default)]
struct ScriptedResolver {
    offsets: Mutex<Vec<usize>>,
    /// 在该偏移上失败一次
    fail_once_at: Mutex<Option<usize>>,
    /// 设置后，求解开始时通知 `started`，等待 `gate` 放行
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
    /// 每批最多返回的条目数
    max_entries: Option<usize>,
    /// 加到返回 id 上的偏移，用于模拟编号错位
    id_shift: u64,
}

impl ScriptedResolver {
    fn failing_once_at(offset: usize) -> Self {
        Self {
            fail_once_at: Mutex::new(Some(offset)),
            ..Self::default()
        }
    }

    fn gated(started: Arc<Notify>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some((started, gate)),
            ..Self::default()
        }
    }

    fn returning_at_most(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::default()
        }
    }

    fn shifting_ids(id_shift: u64) -> Self {
        Self {
            id_shift,
            ..Self::default()
        }
    }

    fn offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(
        &self,
        batch: &[ProblemDescriptor],
        start_offset: usize,
    ) -> Result<Vec<SolvedProblem>, PipelineError> {
        self.offsets.lock().unwrap().push(start_offset);

        if let Some((started, gate)) = &self.gate {
            started.notify_one();
            gate.notified().await;
        }

        {
            let mut fail_once_at = self.fail_once_at.lock().unwrap();
            if *fail_once_at == Some(start_offset) {
                *fail_once_at = None;
                return Err(PipelineError::Resolution("serviço indisponível".into()));
            }
        }

        Ok(batch
            .iter()
            .take(self.max_entries.unwrap_or(batch.len()))
            .enumerate()
            .map(|(i, d)| {
                let open = d.raw_content.contains("open");
                SolvedProblem {
                    id: (start_offset + i) as u64 + self.id_shift,
                    statement: d.raw_content.clone(),
                    choices: if open { vec![] } else { vec!["A".into(), "B".into()] },
                    correct_choice_index: if open { None } else { Some(0) },
                    reference_answer: "A".into(),
                    rationale: "porque sim".into(),
                }
            })
            .collect())
    }
}

/// 抽取开始时通知 `started`，等待 `gate` 放行后返回 `n` 道题
struct GatedExtractor {
    n: usize,
    started: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl Extractor for GatedExtractor {
    async fn extract(&self, _document: &Document) -> Result<Vec<ProblemDescriptor>, PipelineError> {
        self.started.notify_one();
        self.gate.notified().await;
        Ok(assign_sequence_ids(
            (0..self.n).map(|i| (i + 1, format!("Questão {}", i + 1))),
        ))
    }
}

fn document() -> Document {
    Document::new("prova.pdf", "application/pdf", b"%PDF-1.4".to_vec())
}

fn controller(
    extractor: &Arc<ScriptedExtractor>,
    resolver: &Arc<ScriptedResolver>,
    store: &Arc<dyn SessionStore>,
    history: &Arc<dyn HistoryLog>,
    batch_size: usize,
) -> SessionController {
    SessionController::new(
        extractor.clone(),
        resolver.clone(),
        store.clone(),
        history.clone(),
        batch_size,
    )
}

/// 用同一个答案答完当前批次
async fn answer_batch(controller: &SessionController, answer: Answer) -> Phase {
    let mut phase = controller.phase().await;
    while let Phase::Presenting(_) = phase {
        phase = assert_ok!(controller.record_answer(answer.clone()).await);
    }
    phase
}

fn presenting_ids(phase: &Phase) -> Vec<u64> {
    match phase {
        Phase::Presenting(quiz) => quiz.problems.iter().map(|p| p.id).collect(),
        other => panic!("期望 Presenting，实际为 {}", other),
    }
}

// ========== 完整流程 ==========

#[tokio::test]
async fn test_seven_problems_in_batches_of_three() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = Arc::new(ScriptedExtractor::numbered(7));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(dir.path().join("s.json")));
    let history: Arc<dyn HistoryLog> = Arc::new(FileHistoryLog::new(dir.path().join("h.json")));
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let phase = assert_ok!(controller.submit_document(document()).await);
    assert_eq!(presenting_ids(&phase), vec![0, 1, 2]);

    let phase = answer_batch(&controller, Answer::Choice(0)).await;
    match &phase {
        Phase::Results(outcome) => {
            assert_eq!((outcome.score, outcome.total), (3, 3));
            assert_eq!((outcome.cursor, outcome.remaining), (3, 4));
        }
        other => panic!("期望 Results，实际为 {}", other),
    }
    assert_eq!(store.load().map(|s| s.cursor), Some(3));

    let phase = assert_ok!(controller.continue_session().await);
    assert_eq!(presenting_ids(&phase), vec![3, 4, 5]);
    answer_batch(&controller, Answer::Choice(1)).await;
    assert_eq!(store.load().map(|s| s.cursor), Some(6));

    let phase = assert_ok!(controller.continue_session().await);
    assert_eq!(presenting_ids(&phase), vec![6]);

    let phase = answer_batch(&controller, Answer::Choice(0)).await;
    match &phase {
        Phase::Completed(Some(outcome)) => {
            assert_eq!(outcome.cursor, 7);
            assert_eq!(outcome.remaining, 0);
        }
        other => panic!("期望 Completed，实际为 {}", other),
    }

    assert!(store.load().is_none());
    assert_eq!(resolver.offsets(), vec![0, 3, 6]);
    assert_eq!(extractor.calls(), 1);

    let totals: Vec<usize> = controller.history().iter().map(|e| e.total).collect();
    assert_eq!(totals, vec![1, 3, 3]);
    let scores: Vec<usize> = controller.history().iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![1, 0, 3]);
}

#[tokio::test]
async fn test_sequence_ids_dense_despite_sparse_source_indices() {
    let extractor = Arc::new(ScriptedExtractor::new(vec![
        "Q1".into(),
        "   ".into(),
        "Q3".into(),
        "Q4".into(),
    ]));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 5);

    assert_ok!(controller.submit_document(document()).await);

    let saved = store.load().unwrap();
    let ids: Vec<usize> = saved.descriptors.iter().map(|d| d.sequence_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    let sources: Vec<usize> = saved.descriptors.iter().map(|d| d.source_index).collect();
    assert_eq!(sources, vec![1, 21, 31]);
}

#[tokio::test]
async fn test_scoring_ignores_open_response() {
    let extractor = Arc::new(ScriptedExtractor::new(vec![
        "mc 1".into(),
        "mc 2".into(),
        "open 3".into(),
    ]));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    assert_ok!(controller.submit_document(document()).await);
    assert_ok!(controller.record_answer(Answer::Choice(0)).await);
    assert_ok!(controller.record_answer(Answer::Choice(0)).await);
    let phase = assert_ok!(controller.record_answer(Answer::Text("minha resposta".into())).await);

    match phase {
        Phase::Completed(Some(outcome)) => {
            assert_eq!((outcome.score, outcome.total), (2, 3));
            assert_eq!(outcome.percentage, 67);
        }
        other => panic!("期望 Completed，实际为 {}", other),
    }

    let entry = &controller.history()[0];
    assert_eq!(entry.answers.len(), 3);
    assert_eq!(
        entry.answers.get(&2),
        Some(&Answer::Text("minha resposta".into()))
    );
}

// ========== 失败与重试 ==========

#[tokio::test]
async fn test_resolve_failure_keeps_cursor_and_retry_skips_extraction() {
    let extractor = Arc::new(ScriptedExtractor::numbered(7));
    let resolver = Arc::new(ScriptedResolver::failing_once_at(3));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    assert_ok!(controller.submit_document(document()).await);
    answer_batch(&controller, Answer::Choice(0)).await;

    let phase = assert_ok!(controller.continue_session().await);
    match &phase {
        Phase::Failed(failure) => {
            assert_eq!(failure.stage, FailureStage::Resolving);
            assert!(failure.can_retry());
        }
        other => panic!("期望 Failed，实际为 {}", other),
    }
    assert_eq!(store.load().map(|s| s.cursor), Some(3));

    let phase = assert_ok!(controller.retry().await);
    assert_eq!(presenting_ids(&phase), vec![3, 4, 5]);
    assert_eq!(resolver.offsets(), vec![0, 3, 3]);
    assert_eq!(extractor.calls(), 1);
}

#[tokio::test]
async fn test_extraction_failure_persists_nothing() {
    let extractor = Arc::new(ScriptedExtractor::failing());
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let phase = assert_ok!(controller.submit_document(document()).await);
    match &phase {
        Phase::Failed(failure) => {
            assert_eq!(failure.stage, FailureStage::Scanning);
            assert!(!failure.can_retry());
        }
        other => panic!("期望 Failed，实际为 {}", other),
    }

    assert!(store.load().is_none());
    assert!(resolver.offsets().is_empty());
    assert!(matches!(
        controller.retry().await,
        Err(ControllerError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_empty_extraction_is_failure() {
    let extractor = Arc::new(ScriptedExtractor::new(vec![]));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let phase = assert_ok!(controller.submit_document(document()).await);
    assert!(matches!(phase, Phase::Failed(_)));
    assert!(store.load().is_none());
}

// ========== 恢复 ==========

#[tokio::test]
async fn test_resume_completed_session_skips_resolver() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let finished = BatchSessionState::new(assign_sequence_ids(
        (0..4).map(|i| (i, format!("Q{}", i))),
    ))
    .advanced(4);
    assert_ok!(store.save(&finished));

    let extractor = Arc::new(ScriptedExtractor::numbered(4));
    let resolver = Arc::new(ScriptedResolver::default());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let outcome = assert_ok!(controller.resume().await);
    assert_eq!(outcome, ResumeOutcome::AlreadyComplete);
    assert!(resolver.offsets().is_empty());
    assert!(store.load().is_none());
    assert_eq!(controller.phase().await, Phase::Completed(None));
}

#[tokio::test]
async fn test_resume_after_restart_continues_at_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("active_session.json");
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());

    let before = {
        let extractor = Arc::new(ScriptedExtractor::numbered(7));
        let resolver = Arc::new(ScriptedResolver::default());
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&session_path));
        let controller = controller(&extractor, &resolver, &store, &history, 3);

        assert_ok!(controller.submit_document(document()).await);
        answer_batch(&controller, Answer::Choice(0)).await;
        store.load().unwrap()
    };

    // 新的存储实例读到同样的数据
    let reopened: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&session_path));
    assert_eq!(reopened.load(), Some(before.clone()));
    assert_eq!(before.cursor, 3);

    let extractor = Arc::new(ScriptedExtractor::numbered(7));
    let resolver = Arc::new(ScriptedResolver::default());
    let controller = controller(&extractor, &resolver, &reopened, &history, 3);

    match assert_ok!(controller.resume().await) {
        ResumeOutcome::Resumed(phase) => assert_eq!(presenting_ids(&phase), vec![3, 4, 5]),
        other => panic!("期望 Resumed，实际为 {:?}", other),
    }
    assert_eq!(extractor.calls(), 0);
    assert_eq!(resolver.offsets(), vec![3]);
}

#[tokio::test]
async fn test_resume_without_saved_session() {
    let extractor = Arc::new(ScriptedExtractor::numbered(1));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    assert!(matches!(
        controller.resume().await,
        Err(ControllerError::NoSavedSession)
    ));
}

#[tokio::test]
async fn test_resume_cursor_past_end_is_already_complete() {
    let store = Arc::new(MemorySessionStore::new());
    store.put_raw(
        r#"{"descriptors":[{"sequenceId":0,"sourceIndex":1,"rawContent":"Q1"}],"cursor":5,"lastUpdated":0}"#,
    );
    let store: Arc<dyn SessionStore> = store;

    let extractor = Arc::new(ScriptedExtractor::numbered(1));
    let resolver = Arc::new(ScriptedResolver::default());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let outcome = assert_ok!(controller.resume().await);
    assert_eq!(outcome, ResumeOutcome::AlreadyComplete);
    assert!(resolver.offsets().is_empty());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_resume_without_descriptors_is_already_complete() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    assert_ok!(store.save(&BatchSessionState::new(vec![])));

    let extractor = Arc::new(ScriptedExtractor::numbered(1));
    let resolver = Arc::new(ScriptedResolver::default());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let outcome = assert_ok!(controller.resume().await);
    assert_eq!(outcome, ResumeOutcome::AlreadyComplete);
    assert!(resolver.offsets().is_empty());
    assert_eq!(controller.phase().await, Phase::Completed(None));
}

// ========== 并发 ==========

#[tokio::test]
async fn test_second_request_rejected_while_resolving() {
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let extractor = Arc::new(ScriptedExtractor::numbered(4));
    let resolver = Arc::new(ScriptedResolver::gated(started.clone(), gate.clone()));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let background = controller.clone();
    let handle = tokio::spawn(async move { background.submit_document(document()).await });
    started.notified().await;

    assert!(matches!(controller.phase().await, Phase::Resolving { .. }));
    assert!(matches!(
        controller.submit_document(document()).await,
        Err(ControllerError::Busy { .. })
    ));
    assert!(matches!(
        controller.resume().await,
        Err(ControllerError::Busy { .. })
    ));
    assert_err!(controller.review(1).await);

    gate.notify_one();
    let phase = assert_ok!(handle.await.unwrap());
    assert_eq!(presenting_ids(&phase), vec![0, 1, 2]);
    assert_eq!(resolver.offsets(), vec![0]);
    assert_eq!(extractor.calls(), 1);
}

#[tokio::test]
async fn test_reset_while_resolving_discards_result() {
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let extractor = Arc::new(ScriptedExtractor::numbered(4));
    let resolver = Arc::new(ScriptedResolver::gated(started.clone(), gate.clone()));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let background = controller.clone();
    let handle = tokio::spawn(async move { background.submit_document(document()).await });
    started.notified().await;

    assert_eq!(controller.reset().await, Phase::Idle);
    gate.notify_one();

    let phase = assert_ok!(handle.await.unwrap());
    assert_eq!(phase, Phase::Idle);
    assert_eq!(controller.phase().await, Phase::Idle);
    assert!(store.load().is_none());
    assert!(controller.history().is_empty());
}

#[tokio::test]
async fn test_reset_while_scanning_discards_extraction() {
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = SessionController::new(
        Arc::new(GatedExtractor {
            n: 4,
            started: started.clone(),
            gate: gate.clone(),
        }),
        resolver.clone(),
        store.clone(),
        history.clone(),
        3,
    );

    let background = controller.clone();
    let handle = tokio::spawn(async move { background.submit_document(document()).await });
    started.notified().await;

    assert!(matches!(controller.phase().await, Phase::Scanning { .. }));
    assert_eq!(controller.reset().await, Phase::Idle);
    gate.notify_one();

    let phase = assert_ok!(handle.await.unwrap());
    assert_eq!(phase, Phase::Idle);
    assert_eq!(controller.phase().await, Phase::Idle);
    assert!(store.load().is_none());
    assert!(resolver.offsets().is_empty());
}

// ========== 求解结果校验 ==========

#[tokio::test]
async fn test_short_batch_advances_cursor_by_resolved_count() {
    let extractor = Arc::new(ScriptedExtractor::numbered(7));
    let resolver = Arc::new(ScriptedResolver::returning_at_most(2));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let phase = assert_ok!(controller.submit_document(document()).await);
    assert_eq!(presenting_ids(&phase), vec![0, 1]);

    match answer_batch(&controller, Answer::Choice(0)).await {
        Phase::Results(outcome) => {
            assert_eq!((outcome.score, outcome.total), (2, 2));
            assert_eq!((outcome.cursor, outcome.remaining), (2, 5));
        }
        other => panic!("期望 Results，实际为 {}", other),
    }
    assert_eq!(store.load().map(|s| s.cursor), Some(2));

    let phase = assert_ok!(controller.continue_session().await);
    assert_eq!(presenting_ids(&phase), vec![2, 3]);
    assert_eq!(resolver.offsets(), vec![0, 2]);
}

#[tokio::test]
async fn test_misnumbered_ids_fail_retryably() {
    let extractor = Arc::new(ScriptedExtractor::numbered(4));
    let resolver = Arc::new(ScriptedResolver::shifting_ids(1));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    let phase = assert_ok!(controller.submit_document(document()).await);
    match &phase {
        Phase::Failed(failure) => {
            assert_eq!(failure.stage, FailureStage::Resolving);
            assert!(matches!(failure.error, PipelineError::MalformedOutput(_)));
            assert!(failure.can_retry());
        }
        other => panic!("期望 Failed，实际为 {}", other),
    }
    assert_eq!(store.load().map(|s| s.cursor), Some(0));
    assert!(controller.history().is_empty());
}

// ========== 历史查看 ==========

#[tokio::test]
async fn test_review_and_dismiss_keep_saved_progress() {
    let extractor = Arc::new(ScriptedExtractor::numbered(5));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    assert_ok!(controller.submit_document(document()).await);
    answer_batch(&controller, Answer::Choice(1)).await;

    let phase = assert_ok!(controller.review(1).await);
    match &phase {
        Phase::Reviewing(entry) => {
            assert_eq!(entry.id, Some(1));
            assert_eq!((entry.score, entry.total), (0, 3));
            assert_eq!(entry.problems.len(), 3);
        }
        other => panic!("期望 Reviewing，实际为 {}", other),
    }
    assert!(matches!(
        controller.review(42).await,
        Err(ControllerError::HistoryEntryNotFound(42))
    ));

    assert_eq!(assert_ok!(controller.dismiss().await), Phase::Idle);
    assert_eq!(controller.saved_session().map(|s| s.cursor), Some(3));

    match assert_ok!(controller.resume().await) {
        ResumeOutcome::Resumed(phase) => assert_eq!(presenting_ids(&phase), vec![3, 4]),
        other => panic!("期望 Resumed，实际为 {:?}", other),
    }
}

#[tokio::test]
async fn test_review_from_presenting_drops_batch_answers() {
    let extractor = Arc::new(ScriptedExtractor::numbered(6));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    assert_ok!(controller.submit_document(document()).await);
    answer_batch(&controller, Answer::Choice(0)).await;
    assert_ok!(controller.continue_session().await);
    assert_ok!(controller.record_answer(Answer::Choice(0)).await);

    assert_ok!(controller.review(1).await);
    assert_eq!(controller.history().len(), 1);
    assert_eq!(controller.saved_session().map(|s| s.cursor), Some(3));
}

#[tokio::test]
async fn test_clear_history_through_controller() {
    let extractor = Arc::new(ScriptedExtractor::numbered(4));
    let resolver = Arc::new(ScriptedResolver::default());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let history: Arc<dyn HistoryLog> = Arc::new(MemoryHistoryLog::new());
    let controller = controller(&extractor, &resolver, &store, &history, 3);

    assert_ok!(controller.submit_document(document()).await);
    answer_batch(&controller, Answer::Choice(0)).await;
    assert_eq!(controller.history().len(), 1);

    assert_ok!(controller.clear_history());
    assert!(controller.history().is_empty());
    assert!(matches!(
        controller.review(1).await,
        Err(ControllerError::HistoryEntryNotFound(1))
    ));
    // 保存的进度不受影响
    assert_eq!(controller.saved_session().map(|s| s.cursor), Some(3));
}
