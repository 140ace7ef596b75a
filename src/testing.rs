//! Mock implementations for testing
//!
//! These mocks enable testing the chat flow without real I/O.

use crate::db::{ConversationTurn, HistoryPage, HistoryQuery, Pagination};
use crate::history::{HistoryStore, PersistenceError};
use crate::llm::{LlmError, ModelClient, ModelRequest};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Model Client
// ============================================================================

/// Mock model client that returns queued responses
pub struct MockModelClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl MockModelClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<String, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_response()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Delayed Mock Model Client (for timeout and supersede testing)
// ============================================================================

/// Mock model client with configurable delay
pub struct DelayedMockModelClient {
    inner: MockModelClient,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockModelClient {
    pub fn new(model_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: MockModelClient::new(model_id),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, text: impl Into<String>) {
        self.inner.queue_response(text);
    }
}

#[async_trait]
impl ModelClient for DelayedMockModelClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_waiters();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// In-memory History Store
// ============================================================================

#[derive(Clone)]
struct StoredTurn {
    user: String,
    turn: ConversationTurn,
}

/// History store kept in a vector, with switchable failure
#[derive(Default)]
pub struct MemoryHistoryStore {
    turns: Mutex<Vec<StoredTurn>>,
    failing: AtomicBool,
    next_id: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.turns.lock().unwrap().len()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Database(crate::db::DbError::LockPoisoned));
        }
        Ok(())
    }

    /// Owned turns, newest first
    fn owned(&self, user: &str) -> Vec<ConversationTurn> {
        self.turns
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|s| s.user == user)
            .map(|s| s.turn.clone())
            .collect()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn list_recent(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, PersistenceError> {
        self.check()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut turns = self.owned(user);
        turns.truncate(limit as usize);
        Ok(turns)
    }

    async fn list_page(
        &self,
        user: &str,
        query: HistoryQuery,
    ) -> Result<HistoryPage, PersistenceError> {
        self.check()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let query = query.normalized();
        let all: Vec<_> = self
            .owned(user)
            .into_iter()
            .filter(|t| !query.favorite_only || t.is_favorite)
            .collect();
        let pagination = Pagination::new(&query, all.len() as u64);
        let turns = all
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();
        Ok(HistoryPage { turns, pagination })
    }

    async fn create(
        &self,
        user: &str,
        prompt: &str,
        response: &str,
        tags: &[String],
    ) -> Result<ConversationTurn, PersistenceError> {
        self.check()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let turn = ConversationTurn {
            id: format!("turn-{n}"),
            prompt: prompt.to_string(),
            response: response.to_string(),
            created_at: Utc::now(),
            is_favorite: false,
            tags: tags.to_vec(),
        };
        self.turns.lock().unwrap().push(StoredTurn {
            user: user.to_string(),
            turn: turn.clone(),
        });
        Ok(turn)
    }

    async fn delete(&self, user: &str, id: &str) -> Result<(), PersistenceError> {
        self.check()?;
        let mut turns = self.turns.lock().unwrap();
        let before = turns.len();
        turns.retain(|s| !(s.user == user && s.turn.id == id));
        if turns.len() == before {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn toggle_favorite(
        &self,
        user: &str,
        id: &str,
    ) -> Result<ConversationTurn, PersistenceError> {
        self.check()?;
        let mut turns = self.turns.lock().unwrap();
        let stored = turns
            .iter_mut()
            .find(|s| s.user == user && s.turn.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        stored.turn.is_favorite = !stored.turn.is_favorite;
        Ok(stored.turn.clone())
    }
}
