//! Chat session state and session storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::backend::{AnswerService, BackendError};

use super::turn::{Role, SessionId, Turn};
use super::view::TranscriptView;

/// Default session timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live session has this identifier.
    #[error("session {0} not found")]
    UnknownSession(SessionId),
    /// A user turn is still waiting for its answer.
    #[error("an answer is still pending for this session")]
    AnswerPending,
    /// The session was cleared while the answer was in flight.
    #[error("session was cleared before the answer arrived")]
    Superseded,
}

/// A user turn that has been appended and is waiting for its answer.
///
/// Returned by [`ChatSession::begin_turn`] and consumed by
/// [`ChatSession::complete_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    session_id: SessionId,
    question: String,
}

impl PendingQuestion {
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }
}

/// A single chat session.
///
/// The transcript always starts with the assistant welcome turn, and every
/// user turn is followed by exactly one assistant turn before the next user
/// turn is accepted.
#[derive(Debug)]
pub struct ChatSession {
    id: SessionId,
    welcome: String,
    turns: Vec<Turn>,
    last_activity: DateTime<Utc>,
}

impl ChatSession {
    /// Start a session whose transcript holds only the welcome turn.
    #[must_use]
    pub fn start(welcome: impl Into<String>) -> Self {
        let welcome = welcome.into();
        Self {
            id: SessionId::generate(),
            turns: vec![Turn::assistant(welcome.clone())],
            welcome,
            last_activity: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Whether the newest turn is a user turn still waiting for its answer.
    #[must_use]
    pub fn awaiting_answer(&self) -> bool {
        self.turns.last().is_some_and(|t| t.role() == Role::User)
    }

    /// Send `text` to `answers` and record the exchange.
    ///
    /// Blank input is ignored and returns `Ok(None)`. Otherwise exactly one
    /// user turn and one assistant turn are appended; backend failures become
    /// the assistant turn's text.
    pub async fn submit_user_text<S>(
        &mut self,
        text: &str,
        answers: &S,
    ) -> Result<Option<Turn>, SessionError>
    where
        S: AnswerService + ?Sized,
    {
        let Some(pending) = self.begin_turn(text)? else {
            return Ok(None);
        };
        let outcome = answers.answer(pending.question(), pending.session_id()).await;
        self.complete_turn(pending, outcome).map(Some)
    }

    /// Append the user turn for `text`.
    ///
    /// Returns `Ok(None)` when `text` is blank after trimming.
    pub fn begin_turn(&mut self, text: &str) -> Result<Option<PendingQuestion>, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if self.awaiting_answer() {
            return Err(SessionError::AnswerPending);
        }

        self.push(Turn::user(text));
        Ok(Some(PendingQuestion {
            session_id: self.id,
            question: text.to_string(),
        }))
    }

    /// Append the assistant turn answering `pending`.
    pub fn complete_turn(
        &mut self,
        pending: PendingQuestion,
        outcome: Result<String, BackendError>,
    ) -> Result<Turn, SessionError> {
        if pending.session_id != self.id || !self.awaiting_answer() {
            tracing::debug!(
                session_id = %pending.session_id,
                current_session_id = %self.id,
                "Dropping answer for superseded question"
            );
            return Err(SessionError::Superseded);
        }

        let text = match outcome {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    error = %e,
                    "Answer service call failed"
                );
                e.turn_text()
            }
        };

        let turn = Turn::assistant(text);
        self.push(turn.clone());
        Ok(turn)
    }

    /// Reset to a fresh welcome turn under a new identifier.
    pub fn clear(&mut self) -> SessionId {
        self.id = SessionId::generate();
        self.turns.clear();
        self.push(Turn::assistant(self.welcome.clone()));
        self.id
    }

    /// Lazy render view of the transcript.
    #[must_use]
    pub fn render_transcript(&self) -> TranscriptView<'_> {
        TranscriptView::new(&self.turns)
    }

    /// Check if the session has been idle longer than `timeout`.
    ///
    /// A session waiting for an answer never expires.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        if self.awaiting_answer() {
            return false;
        }
        // Negative duration means clock skew; treat as fresh.
        (Utc::now() - self.last_activity)
            .to_std()
            .is_ok_and(|idle| idle >= timeout)
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.last_activity = Utc::now();
    }
}

/// Shared handle to a session held in a [`SessionStore`].
///
/// The lock is only held for the duration of a state change, never across
/// the outbound answer call.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<ChatSession>>,
}

impl SessionHandle {
    fn new(session: ChatSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current identifier (changes when the session is cleared).
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.lock().id()
    }

    /// Run `f` against the session while holding its lock.
    pub fn read<R>(&self, f: impl FnOnce(&ChatSession) -> R) -> R {
        f(&self.lock())
    }

    /// Send `text` and record the exchange.
    ///
    /// The outbound call runs on its own task: once issued it always finishes
    /// and appends its assistant turn, even if the caller goes away. If that
    /// task dies, the failure itself becomes the assistant turn.
    pub async fn submit(
        &self,
        text: &str,
        answers: Arc<dyn AnswerService>,
    ) -> Result<Option<Turn>, SessionError> {
        let pending = {
            let mut session = self.lock();
            session.begin_turn(text)?
        };
        let Some(pending) = pending else {
            return Ok(None);
        };

        let handle = self.clone();
        let question = pending.clone();
        let task = tokio::spawn(async move {
            let outcome = answers
                .answer(question.question(), question.session_id())
                .await;
            handle.lock().complete_turn(question, outcome)
        });

        match task.await {
            Ok(result) => result.map(Some),
            Err(e) => self
                .lock()
                .complete_turn(pending, Err(BackendError::Task(e.to_string())))
                .map(Some),
        }
    }
}

/// Thread-safe store for sessions.
///
/// Provides methods for starting, retrieving, clearing, and expiring sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    welcome: String,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionStore {
    /// Create a store whose sessions greet with `welcome`.
    #[must_use]
    pub fn new(welcome: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                welcome: welcome.into(),
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session and return its handle.
    #[must_use]
    pub fn start(&self) -> SessionHandle {
        let session = ChatSession::start(self.inner.welcome.clone());
        let id = session.id();
        let handle = SessionHandle::new(session);
        self.write().insert(id, handle.clone());
        handle
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.read().get(id).cloned()
    }

    /// Clear a session, re-keying it under its new identifier.
    pub fn clear(&self, id: &SessionId) -> Result<SessionId, SessionError> {
        let mut sessions = self.write();
        let handle = sessions
            .remove(id)
            .ok_or(SessionError::UnknownSession(*id))?;
        let new_id = handle.lock().clear();
        sessions.insert(new_id, handle);
        Ok(new_id)
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.write().remove(id)
    }

    /// Get the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions that have been inactive longer than the timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.lock().is_expired_with_timeout(timeout));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELCOME: &str = "Hello! What can I fetch for you?";

    struct FixedAnswer(Result<&'static str, ()>);

    #[async_trait::async_trait]
    impl AnswerService for FixedAnswer {
        async fn answer(
            &self,
            _question: &str,
            _session_id: &SessionId,
        ) -> Result<String, BackendError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(BackendError::Parse(
                    crate::backend::ParseError::MissingField("analysis"),
                )),
            }
        }
    }

    #[test]
    fn test_start_has_single_welcome_turn() {
        let session = ChatSession::start(WELCOME);
        let turns: Vec<_> = session.render_transcript().iter().collect();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[0].text, WELCOME);
        assert!(!session.awaiting_answer());
    }

    #[tokio::test]
    async fn test_submit_appends_user_and_assistant() {
        let mut session = ChatSession::start(WELCOME);
        let turn = session
            .submit_user_text("  revenue this month?  ", &FixedAnswer(Ok("Revenue: $10,000")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn.text(), "Revenue: $10,000");
        let turns = session.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("revenue this month?"));
        assert_eq!(turns[2].role(), Role::Assistant);
    }

    #[tokio::test]
    async fn test_failed_answer_becomes_error_turn() {
        let mut session = ChatSession::start(WELCOME);
        let turn = session
            .submit_user_text("sales?", &FixedAnswer(Err(())))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn.text(), "Error: Unable to get response");
        assert_eq!(session.turns().len(), 3);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut session = ChatSession::start(WELCOME);
        let result = session
            .submit_user_text("   \n\t", &FixedAnswer(Ok("unused")))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(session.turns().len(), 1);
    }

    #[test]
    fn test_second_question_rejected_while_pending() {
        let mut session = ChatSession::start(WELCOME);
        let pending = session.begin_turn("first").unwrap().unwrap();

        assert!(session.awaiting_answer());
        assert!(matches!(
            session.begin_turn("second"),
            Err(SessionError::AnswerPending)
        ));

        session
            .complete_turn(pending, Ok("answer".to_string()))
            .unwrap();
        assert!(session.begin_turn("second").unwrap().is_some());
    }

    #[test]
    fn test_clear_resets_and_regenerates_id() {
        let mut session = ChatSession::start(WELCOME);
        let pending = session.begin_turn("question").unwrap().unwrap();
        let old_id = session.id();

        let new_id = session.clear();

        assert_ne!(new_id, old_id);
        assert_eq!(session.turns(), &[Turn::assistant(WELCOME)]);

        // The in-flight answer belongs to the old session and is dropped.
        assert!(matches!(
            session.complete_turn(pending, Ok("late".to_string())),
            Err(SessionError::Superseded)
        ));
        assert_eq!(session.turns().len(), 1);
    }

    #[test]
    fn test_session_store() {
        let store = SessionStore::new(WELCOME);

        assert!(store.is_empty());

        let handle = store.start();
        assert_eq!(store.len(), 1);

        let retrieved = store.get(&handle.id()).unwrap();
        assert_eq!(retrieved.id(), handle.id());

        store.remove(&handle.id());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_clear_rekeys_session() {
        let store = SessionStore::new(WELCOME);
        let handle = store.start();
        let old_id = handle.id();

        let new_id = store.clear(&old_id).unwrap();

        assert_ne!(new_id, old_id);
        assert!(store.get(&old_id).is_none());
        assert_eq!(store.get(&new_id).unwrap().id(), new_id);
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.clear(&old_id),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_submit_runs_exchange() {
        let store = SessionStore::new(WELCOME);
        let handle = store.start();
        let answers: Arc<dyn AnswerService> = Arc::new(FixedAnswer(Ok("Sales up 5%")));

        let turn = handle.submit("sales?", answers).await.unwrap().unwrap();

        assert_eq!(turn.text(), "Sales up 5%");
        assert_eq!(handle.read(|s| s.turns().len()), 3);
    }

    struct PanickingAnswer;

    #[async_trait::async_trait]
    impl AnswerService for PanickingAnswer {
        async fn answer(
            &self,
            _question: &str,
            _session_id: &SessionId,
        ) -> Result<String, BackendError> {
            panic!("answer service blew up");
        }
    }

    #[tokio::test]
    async fn test_handle_submit_survives_failed_task() {
        let store = SessionStore::new(WELCOME);
        let handle = store.start();

        let turn = handle
            .submit("q1", Arc::new(PanickingAnswer))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn.role(), Role::Assistant);
        assert!(
            turn.text().starts_with("Error connecting to the API: "),
            "{}",
            turn.text()
        );
        assert!(!handle.read(ChatSession::awaiting_answer));
        assert_eq!(handle.read(|s| s.turns().len()), 3);

        // The session still takes questions afterwards.
        let answers: Arc<dyn AnswerService> = Arc::new(FixedAnswer(Ok("Sales up 5%")));
        let turn = handle.submit("q2", answers).await.unwrap().unwrap();
        assert_eq!(turn.text(), "Sales up 5%");
        assert_eq!(handle.read(|s| s.turns().len()), 5);

        // And it is eligible for expiry again.
        assert_eq!(store.cleanup_expired_with_timeout(Duration::ZERO), 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = SessionStore::new(WELCOME);
        let idle = store.start();
        let waiting = store.start();
        let _pending = waiting.inner.lock().unwrap().begin_turn("q").unwrap();

        let removed = store.cleanup_expired_with_timeout(Duration::ZERO);

        assert_eq!(removed, 1);
        assert!(store.get(&idle.id()).is_none());
        assert!(store.get(&waiting.id()).is_some());
    }
}
