//! Keyed in-memory session store with explicit expiry sweeping.

use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use curio_catalog::ProductCategory;
use curio_config::SessionsConfig;
use curio_protocol::SessionId;
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Product surfaced to the assistant, kept for validation lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// Catalog product id.
    pub id: String,
    /// Display name at the time it was surfaced.
    pub name: String,
}

/// One search execution recorded for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRecord {
    /// Query string the assistant searched for.
    pub query: String,
    /// Category filter applied, if any.
    pub category: Option<ProductCategory>,
    /// Ordered result identifiers presented to the assistant.
    pub hits: Vec<SearchHit>,
    /// Timestamp of the search.
    pub created_at: DateTime<Utc>,
}

/// Session state owned by the server for the session's lifetime.
#[derive(Debug, Clone)]
struct Session {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Most recent search first.
    searches: VecDeque<SearchRecord>,
    /// Products surfaced by detail and recommendation calls, freshest first.
    references: VecDeque<SearchHit>,
}

/// Read-only view of a session returned by the context endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: SessionId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp given current activity.
    pub expires_at: DateTime<Utc>,
    /// Search history, most recent first.
    pub search_history: Vec<SearchRecord>,
    /// Fresh product references, most recent first.
    pub references: Vec<SearchHit>,
}

/// Explicit keyed session store passed by handle into the coordinator and
/// validator. No process-wide globals.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    ttl: Duration,
    max_search_records: usize,
    max_references: usize,
}

impl SessionStore {
    /// Create a store from the sessions config.
    pub fn new(config: &SessionsConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::minutes(config.ttl_minutes),
            max_search_records: config.max_search_records,
            max_references: config.max_references,
        }
    }

    /// Create a new session and return its id and expiry.
    pub fn create_session(&self) -> (SessionId, DateTime<Utc>, DateTime<Utc>) {
        let session_id = Uuid::new_v4();
        let created_at = Utc::now();
        let expires_at = created_at + self.ttl;
        info!(
            "created session (session_id={}, expires_at={})",
            session_id, expires_at
        );
        self.sessions.write().insert(
            session_id,
            Session {
                created_at,
                expires_at,
                searches: VecDeque::new(),
                references: VecDeque::new(),
            },
        );
        (session_id, created_at, expires_at)
    }

    /// Whether the id is present at all, expired or not.
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.read().contains_key(&session_id)
    }

    /// Fail fast when the session is unknown or expired.
    ///
    /// An expired-but-unswept session behaves exactly like a swept one; the
    /// sweeper only reclaims memory.
    pub fn ensure_active(&self, session_id: SessionId) -> Result<(), CoreError> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(&session_id)
            .ok_or(CoreError::UnknownSession(session_id))?;
        if session.expires_at <= Utc::now() {
            return Err(CoreError::SessionExpired(session_id));
        }
        Ok(())
    }

    /// Extend the session's expiry after activity.
    pub fn touch(&self, session_id: SessionId) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.expires_at = Utc::now() + self.ttl;
        }
    }

    /// Record a search execution, evicting the oldest past the bound.
    pub fn record_search(
        &self,
        session_id: SessionId,
        record: SearchRecord,
    ) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(CoreError::UnknownSession(session_id))?;
        debug!(
            "recorded search (session_id={}, query_len={}, hits={})",
            session_id,
            record.query.len(),
            record.hits.len()
        );
        session.searches.push_front(record);
        session.searches.truncate(self.max_search_records);
        Ok(())
    }

    /// Record products surfaced outside of search (details, recommendations).
    pub fn record_references(
        &self,
        session_id: SessionId,
        hits: Vec<SearchHit>,
    ) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(CoreError::UnknownSession(session_id))?;
        for hit in hits {
            session.references.retain(|known| known.id != hit.id);
            session.references.push_front(hit);
        }
        session.references.truncate(self.max_references);
        Ok(())
    }

    /// Product ids the assistant may legitimately reference right now.
    ///
    /// Ordered freshest first: detail/recommendation references, then search
    /// records younger than the freshness window, deduplicated by id.
    pub fn fresh_hits(
        &self,
        session_id: SessionId,
        freshness: Duration,
    ) -> Result<Vec<SearchHit>, CoreError> {
        self.ensure_active(session_id)?;
        let sessions = self.sessions.read();
        let session = sessions
            .get(&session_id)
            .ok_or(CoreError::UnknownSession(session_id))?;
        let cutoff = Utc::now() - freshness;
        let mut seen = std::collections::HashSet::new();
        let mut hits = Vec::new();
        for hit in &session.references {
            if seen.insert(hit.id.clone()) {
                hits.push(hit.clone());
            }
        }
        for record in &session.searches {
            if record.created_at < cutoff {
                continue;
            }
            for hit in &record.hits {
                if seen.insert(hit.id.clone()) {
                    hits.push(hit.clone());
                }
            }
        }
        Ok(hits)
    }

    /// Snapshot for the context endpoint; requires an active session.
    pub fn snapshot(&self, session_id: SessionId) -> Result<SessionSnapshot, CoreError> {
        self.ensure_active(session_id)?;
        let sessions = self.sessions.read();
        let session = sessions
            .get(&session_id)
            .ok_or(CoreError::UnknownSession(session_id))?;
        Ok(SessionSnapshot {
            session_id,
            created_at: session.created_at,
            expires_at: session.expires_at,
            search_history: session.searches.iter().cloned().collect(),
            references: session.references.iter().cloned().collect(),
        })
    }

    /// Drop every expired session; returns how many were removed.
    pub fn remove_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    /// Spawn the periodic expiry sweeper.
    pub fn spawn_sweeper(&self, interval: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.remove_expired();
                if removed > 0 {
                    info!("swept expired sessions (removed={})", removed);
                }
            }
        })
    }
}
