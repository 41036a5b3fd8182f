//! Per-session serialized reducer.
//!
//! Every [`Action`], whether it comes from an HTTP request or from a background
//! generation task, is a message on one unbounded channel. A single task drains
//! it, applies [`reduce`] and publishes the new [`AppView`]; nothing else
//! writes the view.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, error};
use uuid::Uuid;

use crate::{
    compare::{ComparisonWidget, PointerScope},
    encoder::EncodedImage,
    gemini::RedesignModel,
    models::{AnalysisOverview, SuggestionCard},
    orchestrator::{generate_all, GenerationEvent},
    view::{reduce, Action, AppView, Screen, TransitionError},
};

pub type SessionStore = Arc<RwLock<HashMap<Uuid, Arc<Session>>>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)] Transition(#[from] TransitionError),
    #[error("session worker has stopped")] Closed,
}

pub struct Command {
    action: Action,
    reply: Option<oneshot::Sender<Result<AppView, TransitionError>>>,
}

impl From<GenerationEvent> for Command {
    fn from(event: GenerationEvent) -> Self {
        Command { action: event.into(), reply: None }
    }
}

pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    updated_at: Arc<RwLock<DateTime<Utc>>>,
    view: Arc<RwLock<Arc<AppView>>>,
    tx: mpsc::UnboundedSender<Command>,
    compare: Mutex<ComparisonWidget>,
}

impl Session {
    /// Creates the session and spawns its reducer task. Must run inside a Tokio runtime.
    pub fn spawn() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = Utc::now();
        let view = Arc::new(RwLock::new(Arc::new(AppView::default())));
        let updated_at = Arc::new(RwLock::new(now));
        let id = Uuid::new_v4();

        tokio::spawn(run_reducer(id, rx, Arc::clone(&view), Arc::clone(&updated_at)));

        Arc::new(Self {
            id,
            created_at: now,
            updated_at,
            view,
            tx,
            compare: Mutex::new(ComparisonWidget::new(PointerScope::default())),
        })
    }

    pub fn view(&self) -> Arc<AppView> {
        self.view.read().clone()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.read()
    }

    /// Runs `f` on the comparison widget. Counts as activity for idle eviction.
    pub fn with_compare<R>(&self, f: impl FnOnce(&mut ComparisonWidget) -> R) -> R {
        let result = f(&mut self.compare.lock());
        *self.updated_at.write() = Utc::now();
        result
    }

    pub async fn dispatch(&self, action: Action) -> Result<Arc<AppView>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command { action, reply: Some(reply) }).map_err(|_| SessionError::Closed)?;
        let next = rx.await.map_err(|_| SessionError::Closed)??;
        Ok(Arc::new(next))
    }

    /// Upload → Analyzing → Selection (or Error). The run is owned by its own
    /// task: a caller that stops waiting (client gone, proxy timeout) cannot
    /// leave the session stuck in `Analyzing`. Generations are launched in the
    /// background and not awaited.
    pub async fn analyze_and_generate(self: &Arc<Self>, model: Arc<dyn RedesignModel>, image: EncodedImage) -> Result<Arc<AppView>, SessionError> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.run_analysis(model, image).await })
            .await
            .map_err(|e| {
                error!("❌ Session {} analysis task died: {}", self.id, e);
                SessionError::Closed
            })?
    }

    async fn run_analysis(&self, model: Arc<dyn RedesignModel>, image: EncodedImage) -> Result<Arc<AppView>, SessionError> {
        let run_id = Uuid::new_v4();
        let image = Arc::new(image);
        self.dispatch(Action::BeginAnalysis { run_id, image: (*image).clone() }).await?;
        info!("🔍 Session {} analyzing with {} (run {})", self.id, model.name(), run_id);

        match model.analyze_space(&image).await {
            Ok(analysis) => {
                let view = self.dispatch(Action::AnalysisSucceeded { run_id, analysis: analysis.clone() }).await?;
                if view.run_id == Some(run_id) && view.screen == Screen::Selection {
                    generate_all(model, image, run_id, &analysis, self.tx.clone());
                }
                Ok(view)
            }
            Err(e) => {
                error!("❌ Session {} analysis failed: {}", self.id, e);
                self.dispatch(Action::AnalysisFailed { run_id }).await
            }
        }
    }

    pub async fn select(&self, index: usize) -> Result<Arc<AppView>, SessionError> {
        let view = self.dispatch(Action::Select(index)).await?;
        self.with_compare(|w| w.reset());
        Ok(view)
    }

    pub async fn back(&self) -> Result<Arc<AppView>, SessionError> {
        let view = self.dispatch(Action::BackToSelection).await?;
        self.with_compare(|w| w.reset());
        Ok(view)
    }

    pub async fn reset(&self) -> Result<Arc<AppView>, SessionError> {
        let view = self.dispatch(Action::Reset).await?;
        self.with_compare(|w| w.reset());
        info!("🔄 Session {} reset", self.id);
        Ok(view)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let view = self.view();
        SessionSnapshot {
            id: self.id,
            screen: view.screen,
            created_at: self.created_at,
            updated_at: self.updated_at(),
            analysis: view.analysis.as_ref().map(AnalysisOverview::from),
            cards: view.cards(),
            selected: view.selected,
            error_message: view.error_message.clone(),
        }
    }
}

async fn run_reducer(
    id: Uuid,
    mut rx: mpsc::UnboundedReceiver<Command>,
    view: Arc<RwLock<Arc<AppView>>>,
    updated_at: Arc<RwLock<DateTime<Utc>>>,
) {
    while let Some(Command { action, reply }) = rx.recv().await {
        let current = view.read().clone();
        let result = reduce(&current, action);
        if let Ok(next) = &result {
            if *current != *next {
                *view.write() = Arc::new(next.clone());
                *updated_at.write() = Utc::now();
            }
        }
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }
    info!("Session {} reducer stopped", id);
}

/// Removes sessions idle for longer than `max_idle`. Dropping the last
/// handle closes the channel, which ends the reducer task.
pub fn evict_idle(store: &SessionStore, max_idle: Duration) -> usize {
    let now = Utc::now();
    let mut sessions = store.write();
    let before = sessions.len();
    sessions.retain(|_, session| {
        now.signed_duration_since(session.updated_at())
            .to_std()
            .map_or(true, |idle| idle <= max_idle)
    });
    before - sessions.len()
}

pub async fn sweep_idle_sessions(store: SessionStore, max_idle: Duration) {
    let mut ticker = tokio::time::interval(max_idle.min(Duration::from_secs(60)).max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let evicted = evict_idle(&store, max_idle);
        if evicted > 0 {
            info!("🧹 Evicted {} idle session(s)", evicted);
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub screen: Screen,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub analysis: Option<AnalysisOverview>,
    pub cards: Vec<SuggestionCard>,
    pub selected: Option<usize>,
    pub error_message: Option<String>,
}
