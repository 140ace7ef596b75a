//! Conversation views and the turn flow
//!
//! A [`ChatView`] is one browser's conversation: its session state, its
//! recent history, and a broadcast channel feeding the SSE stream. Running
//! a turn goes prompt → model → formatter → reveal → session, then saves
//! the turn for signed-in viewers.

use crate::db::ConversationTurn;
use crate::format::format;
use crate::history::{HistoryStore, HistorySynchronizer, RECENT_LIMIT};
use crate::llm::{generate_with_timeout, ImageAttachment, ModelClient, ModelRequest};
use crate::reveal::{reveal, Generation, RevealPlan, UpdateSink, REVEAL_DELAY};
use crate::session::{ConversationSession, SessionSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Views nobody has touched or listened to for this long are torn down
pub const VIEW_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Upper bound on live views
pub const MAX_VIEWS: usize = 1000;

/// Tunables shared by every view
#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub model_timeout: Duration,
    pub reveal_delay: Duration,
    pub recent_limit: usize,
    pub idle_timeout: Duration,
    pub max_views: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(60),
            reveal_delay: REVEAL_DELAY,
            recent_limit: RECENT_LIMIT,
            idle_timeout: VIEW_IDLE_TIMEOUT,
            max_views: MAX_VIEWS,
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum ViewEvent {
    Init {
        state: SessionSnapshot,
        history: Vec<ConversationTurn>,
        authenticated: bool,
    },
    State {
        state: SessionSnapshot,
    },
    Update {
        generation: Generation,
        text: String,
    },
    History {
        turns: Vec<ConversationTurn>,
    },
}

/// One viewer's conversation
pub struct ChatView {
    id: String,
    session: Mutex<ConversationSession>,
    history: Mutex<HistorySynchronizer>,
    events: broadcast::Sender<ViewEvent>,
    model: Arc<dyn ModelClient>,
    settings: ChatSettings,
    last_used: std::sync::Mutex<Instant>,
}

impl ChatView {
    pub fn new(
        id: String,
        user: Option<String>,
        model: Arc<dyn ModelClient>,
        store: Arc<dyn HistoryStore>,
        settings: ChatSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(128);
        Self {
            id,
            session: Mutex::new(ConversationSession::new()),
            history: Mutex::new(HistorySynchronizer::new(store, user, settings.recent_limit)),
            events,
            model,
            settings,
            last_used: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record activity on the view
    pub fn touch(&self) {
        if let Ok(mut last_used) = self.last_used.lock() {
            *last_used = Instant::now();
        }
    }

    /// No subscribers and no activity for at least `limit`
    fn is_idle(&self, limit: Duration) -> bool {
        if self.events.receiver_count() > 0 {
            return false;
        }
        self.last_used
            .lock()
            .is_ok_and(|last_used| last_used.elapsed() >= limit)
    }

    #[allow(dead_code)] // Used in tests
    pub async fn user(&self) -> Option<String> {
        self.history.lock().await.user().map(String::from)
    }

    /// Init event for a new subscriber plus the live receiver
    pub async fn subscribe(&self) -> (ViewEvent, broadcast::Receiver<ViewEvent>) {
        // Subscribe before snapshotting so nothing falls between the two
        let rx = self.events.subscribe();
        (self.init_event().await, rx)
    }

    /// Full snapshot event, sent on subscribe and to lagged subscribers
    pub async fn init_event(&self) -> ViewEvent {
        let (state, history, authenticated) = self.overview().await;
        ViewEvent::Init {
            state,
            history,
            authenticated,
        }
    }

    /// Session snapshot, recent history and whether a user is bound
    pub async fn overview(&self) -> (SessionSnapshot, Vec<ConversationTurn>, bool) {
        let state = self.session.lock().await.snapshot();
        let history = self.history.lock().await;
        (
            state,
            history.recent().to_vec(),
            history.is_authenticated(),
        )
    }

    #[allow(dead_code)] // Used in tests
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    #[allow(dead_code)] // Used in tests
    pub async fn recent(&self) -> Vec<ConversationTurn> {
        self.history.lock().await.recent().to_vec()
    }

    /// Load the viewer's recent turns from the store
    pub async fn load_history(&self) {
        let turns = {
            let mut history = self.history.lock().await;
            history.load_recent().await;
            history.recent().to_vec()
        };
        self.broadcast(ViewEvent::History { turns });
    }

    /// Run one full turn for `prompt`
    pub async fn submit_prompt(self: &Arc<Self>, prompt: String, image: Option<ImageAttachment>) {
        let request = ModelRequest::for_prompt(&prompt, image.clone());
        let generation = {
            let mut session = self.session.lock().await;
            let generation = session.begin_turn(prompt.clone(), image);
            self.publish_state(&session);
            generation
        };

        tracing::info!(view = %self.id, generation = generation.0, "Turn started");

        let raw = match generate_with_timeout(
            self.model.as_ref(),
            &request,
            self.settings.model_timeout,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    view = %self.id,
                    generation = generation.0,
                    kind = ?e.kind,
                    error = %e,
                    "Turn failed"
                );
                let mut session = self.session.lock().await;
                if session.fail_turn(generation, e.user_message()) {
                    self.publish_state(&session);
                }
                return;
            }
        };

        let plan = RevealPlan::for_segments(&format(&raw));
        {
            let mut session = self.session.lock().await;
            if !session.complete_turn(generation) {
                tracing::debug!(view = %self.id, generation = generation.0, "Turn superseded");
                return;
            }
            self.publish_state(&session);
            let handle = reveal(plan, generation, self.settings.reveal_delay, Arc::clone(self));
            session.attach_reveal(generation, handle);
        }

        let saved = {
            let mut history = self.history.lock().await;
            history
                .save_turn(&prompt, &raw)
                .await
                .map(|_| history.recent().to_vec())
        };
        if let Some(turns) = saved {
            self.broadcast(ViewEvent::History { turns });
        }
    }

    pub async fn start_new_conversation(&self) {
        let mut session = self.session.lock().await;
        session.start_new_conversation();
        self.publish_state(&session);
    }

    /// Show a turn from the recent list. False if it is not there.
    pub async fn load_turn(&self, turn_id: &str) -> bool {
        let Some(turn) = self.history.lock().await.find(turn_id).cloned() else {
            return false;
        };
        let mut session = self.session.lock().await;
        session.load_turn(&turn);
        self.publish_state(&session);
        true
    }

    pub async fn delete_turn(&self, turn_id: &str) -> bool {
        let mut history = self.history.lock().await;
        let deleted = history.delete_turn(turn_id).await;
        if deleted {
            self.broadcast(ViewEvent::History {
                turns: history.recent().to_vec(),
            });
        }
        deleted
    }

    pub async fn toggle_favorite(&self, turn_id: &str) -> Option<ConversationTurn> {
        let mut history = self.history.lock().await;
        let turn = history.toggle_favorite(turn_id).await?;
        self.broadcast(ViewEvent::History {
            turns: history.recent().to_vec(),
        });
        Some(turn)
    }

    /// Logout: stop any reveal, clear the conversation and history
    pub async fn teardown(&self) {
        {
            let mut session = self.session.lock().await;
            session.teardown();
            self.publish_state(&session);
        }
        self.history.lock().await.reset();
        self.broadcast(ViewEvent::History { turns: Vec::new() });
    }

    fn publish_state(&self, session: &ConversationSession) {
        self.broadcast(ViewEvent::State {
            state: session.snapshot(),
        });
    }

    fn broadcast(&self, event: ViewEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl UpdateSink for ChatView {
    async fn apply_update(&self, generation: Generation, text: String) -> bool {
        let mut session = self.session.lock().await;
        if !session.apply_update(generation, text.clone()) {
            return false;
        }
        self.broadcast(ViewEvent::Update { generation, text });
        true
    }
}

#[derive(Error, Debug)]
#[error("Too many open conversations ({0}), try again later")]
pub struct RegistryFull(pub usize);

/// All live views, keyed by view id
pub struct ViewRegistry {
    views: RwLock<HashMap<String, Arc<ChatView>>>,
    model: Arc<dyn ModelClient>,
    store: Arc<dyn HistoryStore>,
    settings: ChatSettings,
}

impl ViewRegistry {
    pub fn new(
        model: Arc<dyn ModelClient>,
        store: Arc<dyn HistoryStore>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            views: RwLock::new(HashMap::new()),
            model,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Create a view, loading recent history for signed-in users.
    /// At the view limit, idle views are swept first; if that frees
    /// nothing the request is refused.
    pub async fn create(&self, user: Option<String>) -> Result<Arc<ChatView>, RegistryFull> {
        if self.live_count().await >= self.settings.max_views {
            self.sweep_idle().await;
        }
        if self.live_count().await >= self.settings.max_views {
            tracing::warn!(limit = self.settings.max_views, "View limit reached");
            return Err(RegistryFull(self.settings.max_views));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let view = Arc::new(ChatView::new(
            id.clone(),
            user,
            self.model.clone(),
            self.store.clone(),
            self.settings,
        ));
        view.load_history().await;

        {
            let mut views = self.views.write().await;
            if views.len() >= self.settings.max_views {
                return Err(RegistryFull(self.settings.max_views));
            }
            views.insert(id.clone(), view.clone());
        }
        tracing::info!(view = %id, "Created conversation view");
        Ok(view)
    }

    /// Look up a view and mark it as in use
    pub async fn get(&self, id: &str) -> Option<Arc<ChatView>> {
        let view = self.views.read().await.get(id).cloned()?;
        view.touch();
        Some(view)
    }

    pub async fn live_count(&self) -> usize {
        self.views.read().await.len()
    }

    /// Tear down and drop a view
    pub async fn remove(&self, id: &str) -> bool {
        let Some(view) = self.views.write().await.remove(id) else {
            return false;
        };
        view.teardown().await;
        tracing::info!(view = %id, "Removed conversation view");
        true
    }

    /// Tear down every idle view. Returns how many were dropped.
    pub async fn sweep_idle(&self) -> usize {
        let limit = self.settings.idle_timeout;
        let mut evicted = Vec::new();
        self.views.write().await.retain(|_, view| {
            if view.is_idle(limit) {
                evicted.push(Arc::clone(view));
                false
            } else {
                true
            }
        });

        for view in &evicted {
            view.teardown().await;
            tracing::debug!(view = %view.id(), "Evicted idle conversation view");
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Swept idle conversation views");
        }
        evicted.len()
    }

    /// Sweep idle views periodically until the registry is dropped
    pub fn spawn_idle_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = (self.settings.idle_timeout / 4).max(Duration::from_secs(1));
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep_idle().await;
            }
        })
    }
}
