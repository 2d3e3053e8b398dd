//! Mock implementations for testing
//!
//! These mocks enable integration testing of sessions without a provider.

use super::{RuntimeSettings, SessionEvent, SessionManager};
use crate::catalog::TopicCatalog;
use crate::gateway::{CompletionGateway, FailureCause, GenerationError};
use crate::llm::LlmErrorKind;
use crate::prompt::{PromptKind, PromptRequest};
use crate::session::{Phase, SessionView};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Gateway
// ============================================================================

/// Mock gateway that returns queued results, then a canned comment
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<PromptRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful result
    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a provider failure for `kind`
    pub fn queue_failure(&self, kind: PromptKind, message: &str) {
        self.responses.lock().unwrap().push_back(Err(GenerationError::new(
            kind,
            FailureCause::Provider(LlmErrorKind::ServerError),
            message,
        )));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<PromptRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionGateway for MockGateway {
    async fn complete(&self, request: &PromptRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("Mock {}", request.kind)))
    }
}

// ============================================================================
// Delayed Mock Gateway
// ============================================================================

/// Gateway that holds every call until released
pub struct DelayedMockGateway {
    /// Signalled when a call starts
    pub started: Notify,
    /// Notify once per call to let it finish
    pub release: Notify,
    pub calls: Mutex<usize>,
}

impl DelayedMockGateway {
    pub fn new() -> Self {
        Self {
            started: Notify::new(),
            release: Notify::new(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Default for DelayedMockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionGateway for DelayedMockGateway {
    async fn complete(&self, request: &PromptRequest) -> Result<String, GenerationError> {
        *self.calls.lock().unwrap() += 1;
        self.started.notify_one();
        self.release.notified().await;
        Ok(format!("Delayed {}", request.kind))
    }
}

// ============================================================================
// Test Builder
// ============================================================================

/// Builder for a session manager over the bundled catalog
pub struct TestSessions {
    gateway: Arc<dyn CompletionGateway>,
    seed: Option<u64>,
    idle_timeout: Duration,
}

impl TestSessions {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(MockGateway::new()),
            seed: Some(42),
            idle_timeout: Duration::from_secs(60),
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn CompletionGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn build(self) -> SessionManager {
        let catalog = Arc::new(TopicCatalog::bundled().unwrap());
        SessionManager::new(
            catalog,
            self.gateway,
            RuntimeSettings {
                verse_seed: self.seed,
                idle_timeout: self.idle_timeout,
            },
        )
    }
}

impl Default for TestSessions {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until the session reaches `phase`, via its event stream
pub async fn wait_for_phase(manager: &SessionManager, id: &str, phase: Phase) -> SessionView {
    let (view, mut rx) = manager.subscribe(id).await.unwrap();
    if view.phase == phase {
        return view;
    }
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let SessionEvent::StateChange { view } = rx.recv().await.unwrap() {
                if view.phase == phase {
                    return *view;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for phase")
}

/// Wait until a generation failure has been recorded on the session
pub async fn wait_for_error(manager: &SessionManager, id: &str) -> SessionView {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = manager.view(id).await.unwrap();
            if view.last_error.is_some() && !view.awaiting_generation {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SessionError;

    async fn answer_all(manager: &SessionManager, id: &str, answers: &[&str]) -> SessionView {
        let mut view = None;
        for answer in answers {
            view = Some(manager.submit_answer(id, (*answer).to_string()).await.unwrap());
        }
        view.unwrap()
    }

    #[tokio::test]
    async fn test_mock_gateway() {
        let mock = MockGateway::new();
        mock.queue_text("Hello");
        mock.queue_failure(PromptKind::Encouragement, "down");

        let request = crate::prompt::encouragement("Q", "A");
        assert_eq!(mock.complete(&request).await.unwrap(), "Hello");
        assert!(mock.complete(&request).await.is_err());
        assert_eq!(mock.complete(&request).await.unwrap(), "Mock encouragement");
        assert_eq!(mock.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_create_unknown_topic() {
        let manager = TestSessions::new().build();
        let err = manager.create("missing").await.unwrap_err();
        assert_eq!(err, SessionError::TopicNotFound("missing".to_string()));
    }

    /// Integration test: answering every question of "forgiveness"
    #[tokio::test]
    async fn test_forgiveness_walkthrough() {
        let gateway = Arc::new(MockGateway::new());
        let manager = TestSessions::new().gateway(gateway.clone()).build();
        let created = manager.create("forgiveness").await.unwrap();
        assert_eq!(created.phase, Phase::Questioning { step: 0 });
        assert_eq!(created.question_count, 3);

        let first = manager
            .submit_answer(&created.session_id, "A1".to_string())
            .await
            .unwrap();
        assert_eq!(first.phase, Phase::Questioning { step: 1 });
        assert_eq!(first.answers[0].comment, "Mock encouragement");

        let view = answer_all(&manager, &created.session_id, &["A2", "A3"]).await;
        assert_eq!(view.phase, Phase::AwaitingVerseComment);
        assert_eq!(view.answers.len(), 3);
        assert_eq!(view.current_step, 3);

        let topic = TopicCatalog::bundled().unwrap().find_topic("forgiveness").unwrap();
        let verse = view.selected_verse.unwrap();
        assert!(topic.bible_references.contains(&verse));

        let reflecting = wait_for_phase(&manager, &created.session_id, Phase::Reflecting).await;
        assert_eq!(reflecting.final_comment.as_deref(), Some("Mock verse_reflection"));
        assert!(reflecting.reflection_prompt.is_some());

        let kinds: Vec<PromptKind> = gateway.recorded_requests().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PromptKind::Encouragement,
                PromptKind::Encouragement,
                PromptKind::Encouragement,
                PromptKind::VerseReflection
            ]
        );
    }

    #[tokio::test]
    async fn test_reflection_completes_study() {
        let manager = TestSessions::new().build();
        let id = manager.create("forgiveness").await.unwrap().session_id;
        answer_all(&manager, &id, &["A1", "A2", "A3"]).await;
        wait_for_phase(&manager, &id, Phase::Reflecting).await;

        let done = manager
            .submit_reflection(&id, "I learned patience".to_string())
            .await
            .unwrap();
        assert_eq!(done.phase, Phase::Complete);
        assert_eq!(done.reflection_answer.as_deref(), Some("I learned patience"));
        assert!(!done.reflection_comment.unwrap().is_empty());

        let err = manager.submit_answer(&id, "more".to_string()).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_failure_leaves_state_then_retry_succeeds() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_failure(PromptKind::Encouragement, "provider down");
        let manager = TestSessions::new().gateway(gateway).build();
        let id = manager.create("forgiveness").await.unwrap().session_id;

        let err = manager.submit_answer(&id, "A1".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::GenerationFailure { kind: PromptKind::Encouragement, .. }
        ));

        let view = manager.view(&id).await.unwrap();
        assert_eq!(view.phase, Phase::Questioning { step: 0 });
        assert!(view.answers.is_empty());
        assert_eq!(view.last_error.as_deref(), Some("provider down"));

        let view = manager.submit_answer(&id, "A1".to_string()).await.unwrap();
        assert_eq!(view.phase, Phase::Questioning { step: 1 });
        assert_eq!(view.answers.len(), 1);
        assert!(view.last_error.is_none());
    }

    #[tokio::test]
    async fn test_failure_is_attributed_to_the_sent_request() {
        let gateway = Arc::new(MockGateway::new());
        // Gateway reports a different kind than the request it served
        gateway.queue_failure(PromptKind::Chat, "down");
        let manager = TestSessions::new().gateway(gateway).build();
        let id = manager.create("forgiveness").await.unwrap().session_id;

        let err = manager.submit_answer(&id, "A1".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::GenerationFailure { kind: PromptKind::Encouragement, .. }
        ));
        assert!(!manager.view(&id).await.unwrap().awaiting_generation);

        let view = manager.submit_answer(&id, "A1".to_string()).await.unwrap();
        assert_eq!(view.phase, Phase::Questioning { step: 1 });
        assert_eq!(view.answers.len(), 1);
    }

    #[tokio::test]
    async fn test_final_comment_failure_then_retry() {
        let gateway = Arc::new(MockGateway::new());
        for _ in 0..3 {
            gateway.queue_text("Nice");
        }
        gateway.queue_failure(PromptKind::VerseReflection, "overloaded");
        let manager = TestSessions::new().gateway(gateway).build();
        let id = manager.create("forgiveness").await.unwrap().session_id;

        let answered = answer_all(&manager, &id, &["A1", "A2", "A3"]).await;
        let failed = wait_for_error(&manager, &id).await;
        assert_eq!(failed.phase, Phase::AwaitingVerseComment);
        assert_eq!(failed.selected_verse, answered.selected_verse);

        let view = manager.retry_final_comment(&id).await.unwrap();
        assert_eq!(view.phase, Phase::Reflecting);
        assert_eq!(view.selected_verse, answered.selected_verse);
        assert!(view.final_comment.is_some());
    }

    #[tokio::test]
    async fn test_blank_answer_rejected() {
        let manager = TestSessions::new().build();
        let id = manager.create("faith").await.unwrap().session_id;
        let err = manager.submit_answer(&id, "   ".to_string()).await.unwrap_err();
        assert_eq!(err, SessionError::EmptyInput);
    }

    #[tokio::test]
    async fn test_busy_session_rejects_second_answer() {
        let gateway = Arc::new(DelayedMockGateway::new());
        let manager = Arc::new(TestSessions::new().gateway(gateway.clone()).build());
        let id = manager.create("forgiveness").await.unwrap().session_id;

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            let id = id.clone();
            async move { manager.submit_answer(&id, "A1".to_string()).await }
        });
        gateway.started.notified().await;

        let err = manager.submit_answer(&id, "A1 again".to_string()).await.unwrap_err();
        assert_eq!(err, SessionError::GenerationPending);
        assert!(manager.view(&id).await.unwrap().awaiting_generation);

        gateway.release.notify_one();
        let view = first.await.unwrap().unwrap();
        assert_eq!(view.answers.len(), 1);
        assert_eq!(view.answers[0].text, "A1");
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_close_discards_pending_generation() {
        let gateway = Arc::new(DelayedMockGateway::new());
        let manager = Arc::new(TestSessions::new().gateway(gateway.clone()).build());
        let id = manager.create("forgiveness").await.unwrap().session_id;

        let waiting = tokio::spawn({
            let manager = Arc::clone(&manager);
            let id = id.clone();
            async move { manager.submit_answer(&id, "A1".to_string()).await }
        });
        gateway.started.notified().await;

        manager.close(&id).await.unwrap();
        assert_eq!(waiting.await.unwrap().unwrap_err(), SessionError::SessionClosed);

        gateway.release.notify_one();
        assert!(matches!(
            manager.view(&id).await,
            Err(SessionError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.close(&id).await,
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_seed_selects_same_verse() {
        let mut verses = Vec::new();
        for _ in 0..2 {
            let manager = TestSessions::new().seed(2024).build();
            let id = manager.create("forgiveness").await.unwrap().session_id;
            let view = answer_all(&manager, &id, &["A1", "A2", "A3"]).await;
            verses.push(view.selected_verse.unwrap());
        }
        assert_eq!(verses[0], verses[1]);
    }

    #[tokio::test]
    async fn test_idle_session_shuts_down() {
        let manager = TestSessions::new()
            .idle_timeout(Duration::from_millis(20))
            .build();
        let id = manager.create("hope").await.unwrap().session_id;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(
            manager.view(&id).await,
            Err(SessionError::SessionNotFound(_) | SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_subscribers_see_state_changes() {
        let manager = TestSessions::new().build();
        let id = manager.create("love").await.unwrap().session_id;
        let (initial, mut rx) = manager.subscribe(&id).await.unwrap();
        assert_eq!(initial.current_step, 0);

        manager.submit_answer(&id, "A1".to_string()).await.unwrap();

        let mut saw_pending = false;
        let mut saw_step = false;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::StateChange { view } = event {
                saw_pending |= view.awaiting_generation;
                saw_step |= view.current_step == 1;
            }
        }
        assert!(saw_pending);
        assert!(saw_step);
    }
}
