//! Context validation: the assistant may only reference products it was
//! actually shown.

use crate::error::CoreError;
use crate::session::{SearchHit, SessionStore};
use chrono::Duration;
use curio_config::ContextConfig;
use curio_protocol::{SessionId, Suggestion};
use log::{debug, warn};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Minimum similarity for a candidate to be suggested at all.
const MIN_SIMILARITY: f64 = 0.3;
/// Score floor applied when the id prefix (text before `_`) matches.
const PREFIX_FLOOR: f64 = 0.5;

/// Outcome of validating a product id against session context.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The id was surfaced to the assistant within the freshness window.
    Valid,
    /// The id was never surfaced; ranked alternatives attached.
    Invalid {
        /// Ranked candidates, capped by config, possibly empty.
        suggestions: Vec<Suggestion>,
    },
    /// The session is missing or expired; distinct from a bad id.
    SessionExpired,
}

/// Validates function arguments against a session's recent context.
pub struct ContextValidator {
    sessions: SessionStore,
    freshness: Duration,
    max_suggestions: usize,
    checks: AtomicU64,
    failures: AtomicU64,
}

impl ContextValidator {
    /// Create a validator over the shared session store.
    pub fn new(sessions: SessionStore, config: &ContextConfig) -> Self {
        Self {
            sessions,
            freshness: Duration::minutes(config.freshness_minutes),
            max_suggestions: config.max_suggestions,
            checks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Decide whether `product_id` is a legitimate reference for the session.
    pub fn validate(&self, session_id: SessionId, product_id: &str) -> Validation {
        self.checks.fetch_add(1, AtomicOrdering::Relaxed);
        let hits = match self.sessions.fresh_hits(session_id, self.freshness) {
            Ok(hits) => hits,
            Err(CoreError::SessionExpired(_)) | Err(CoreError::UnknownSession(_)) => {
                debug!("validation against dead session (session_id={})", session_id);
                return Validation::SessionExpired;
            }
            Err(err) => {
                warn!("validation lookup failed (session_id={}): {err}", session_id);
                return Validation::SessionExpired;
            }
        };
        if hits.iter().any(|hit| hit.id == product_id) {
            return Validation::Valid;
        }
        self.failures.fetch_add(1, AtomicOrdering::Relaxed);
        warn!(
            "product id failed context validation (session_id={}, candidates={})",
            session_id,
            hits.len()
        );
        Validation::Invalid {
            suggestions: self.suggest(product_id, &hits),
        }
    }

    /// Total validations performed.
    pub fn check_count(&self) -> u64 {
        self.checks.load(AtomicOrdering::Relaxed)
    }

    /// Validations that did not find an exact match.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(AtomicOrdering::Relaxed)
    }

    /// Rank candidates by similarity; ties break by recency then id.
    fn suggest(&self, product_id: &str, hits: &[SearchHit]) -> Vec<Suggestion> {
        let mut scored: Vec<(f64, usize, &SearchHit)> = hits
            .iter()
            .enumerate()
            .map(|(index, hit)| (score(product_id, hit), index, hit))
            .filter(|(score, _, _)| *score >= MIN_SIMILARITY)
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.id.cmp(&b.2.id))
        });
        scored
            .into_iter()
            .take(self.max_suggestions)
            .map(|(_, _, hit)| Suggestion {
                product_id: hit.id.clone(),
                name: hit.name.clone(),
            })
            .collect()
    }
}

/// Similarity of a requested id against one candidate: the better of the
/// id-to-id and id-to-name ratios, floored when the id prefixes agree.
fn score(product_id: &str, hit: &SearchHit) -> f64 {
    let requested = product_id.to_lowercase();
    let mut best = similarity(&requested, &hit.id.to_lowercase())
        .max(similarity(&requested, &hit.name.to_lowercase()));
    if let (Some(a), Some(b)) = (id_prefix(&requested), id_prefix(&hit.id.to_lowercase()))
        && a == b
    {
        best = best.max(PREFIX_FLOOR);
    }
    best
}

fn id_prefix(id: &str) -> Option<&str> {
    id.split_once('_').map(|(prefix, _)| prefix)
}

/// Normalized Levenshtein similarity in `[0, 1]`.
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
