//! Application state: config, the answer verifier, and the registry of live quiz sessions.
//!
//! Sessions are keyed by UUID and indexed by their source text, so asking to start a quiz
//! for a message that already has a live session returns that session instead of a new one.
//! Every start or resume takes a claim on the session; a surface going away releases its
//! claims and the session closes once nobody holds one.
//!
//! The registry is bounded: idle sessions are swept after `sessions.idle_ttl_secs`, and
//! starting a session at `sessions.max_sessions` evicts the least recently used one.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::{Duration, Instant},
};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dispatch::SessionHandle;
use crate::error::StoreError;
use crate::oracle::{self, Oracle};
use crate::parser::parse;
use crate::session::Session;
use crate::verifier::AnswerVerifier;

struct LiveSession {
    handle: SessionHandle,
    touched: Instant,
    claims: usize,
}

impl LiveSession {
    fn claim(&mut self) -> SessionHandle {
        self.claims += 1;
        self.touched = Instant::now();
        self.handle.clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: EngineConfig,
    pub verifier: AnswerVerifier,
    sessions: Arc<RwLock<HashMap<Uuid, LiveSession>>>,
    by_source: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl AppState {
    /// Build state from env: load config, pick the oracle.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = EngineConfig::load();
        let oracle = oracle::from_config(&config.oracle, &config.prompts);
        Self::with_oracle(config, oracle)
    }

    pub fn with_oracle(config: EngineConfig, oracle: Arc<dyn Oracle>) -> Self {
        let verifier = AnswerVerifier::new(oracle, &config.prompts);
        info!(target: "quiz_engine", oracle = verifier.oracle_name(), "Quiz engine state ready");
        Self {
            config,
            verifier,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            by_source: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start (or resume) the session for `text`. `None` means the text is not a quiz.
    /// The flag is `true` when an existing session was reused. Either way the caller
    /// holds one claim on the session.
    #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
    pub async fn start_session(&self, text: &str) -> Option<(SessionHandle, bool)> {
        if let Some(h) = self.claim_source(text).await {
            debug!(target: "quiz_engine", session = %h.id(), "Reusing live session for identical text");
            return Some((h, true));
        }

        let questions = parse(text);
        let session = Session::new(text, questions)?;
        let total = session.len();

        let mut sessions = self.sessions.write().await;
        let mut by_source = self.by_source.write().await;
        // Another request may have created it while we were parsing.
        if let Some(live) = by_source.get(text).and_then(|id| sessions.get_mut(id)) {
            return Some((live.claim(), true));
        }

        let max = self.config.sessions.max_sessions.max(1);
        while sessions.len() >= max {
            let Some(oldest) = sessions.iter().min_by_key(|(_, l)| l.touched).map(|(id, _)| *id) else {
                break;
            };
            sessions.remove(&oldest);
            by_source.retain(|_, v| *v != oldest);
            info!(target: "quiz_engine", session = %oldest, max, "Least recently used session evicted");
        }

        let id = Uuid::new_v4();
        let handle = SessionHandle::spawn(id, session, self.verifier.clone(), self.config.sessions.queue_depth);
        sessions.insert(id, LiveSession { handle: handle.clone(), touched: Instant::now(), claims: 1 });
        by_source.insert(text.to_string(), id);
        info!(target: "quiz_engine", session = %id, questions = total, "Quiz session started");
        Some((handle, false))
    }

    async fn claim_source(&self, text: &str) -> Option<SessionHandle> {
        let id = { self.by_source.read().await.get(text).copied()? };
        self.sessions.write().await.get_mut(&id).map(LiveSession::claim)
    }

    /// Look up a session and mark it as recently used.
    pub async fn get_session(&self, id: &str) -> Result<SessionHandle, StoreError> {
        let unknown = || StoreError::UnknownSession(id.to_string());
        let uuid = Uuid::parse_str(id).map_err(|_| unknown())?;
        let mut sessions = self.sessions.write().await;
        let live = sessions.get_mut(&uuid).ok_or_else(unknown)?;
        live.touched = Instant::now();
        Ok(live.handle.clone())
    }

    /// Drop a session regardless of claims. Its worker stops once in-flight requests finish;
    /// late verification results are discarded.
    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn close_session(&self, id: &str) -> Result<(), StoreError> {
        let unknown = || StoreError::UnknownSession(id.to_string());
        let uuid = Uuid::parse_str(id).map_err(|_| unknown())?;
        let mut sessions = self.sessions.write().await;
        let mut by_source = self.by_source.write().await;
        sessions.remove(&uuid).ok_or_else(unknown)?;
        by_source.retain(|_, v| *v != uuid);
        info!(target: "quiz_engine", session = %uuid, "Quiz session closed");
        Ok(())
    }

    /// Give back one claim. Returns `true` when that was the last claim and the session closed.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn release_session(&self, id: &str) -> Result<bool, StoreError> {
        let unknown = || StoreError::UnknownSession(id.to_string());
        let uuid = Uuid::parse_str(id).map_err(|_| unknown())?;
        let mut sessions = self.sessions.write().await;
        let live = sessions.get_mut(&uuid).ok_or_else(unknown)?;
        live.claims = live.claims.saturating_sub(1);
        if live.claims > 0 {
            debug!(target: "quiz_engine", session = %uuid, claims = live.claims, "Claim released; session still held");
            return Ok(false);
        }
        sessions.remove(&uuid);
        self.by_source.write().await.retain(|_, v| *v != uuid);
        info!(target: "quiz_engine", session = %uuid, "Last claim released; quiz session closed");
        Ok(true)
    }

    /// Remove every session untouched for at least `ttl`. Returns how many were evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut by_source = self.by_source.write().await;
        let before = sessions.len();
        sessions.retain(|_, live| live.touched.elapsed() < ttl);
        by_source.retain(|_, id| sessions.contains_key(id));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "quiz_engine", evicted, live = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Periodically evict idle sessions. Stops once the state is dropped. `None` when idle
/// eviction is disabled.
pub fn spawn_sweeper(state: &Arc<AppState>) -> Option<JoinHandle<()>> {
    let ttl = state.config.sessions.idle_ttl()?;
    let period = (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let weak: Weak<AppState> = Arc::downgrade(state);
    info!(target: "quiz_engine", ttl_secs = ttl.as_secs(), period_secs = period.as_secs(), "Session sweeper started");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let Some(state) = weak.upgrade() else { break };
            state.evict_idle(ttl).await;
        }
    }))
}
