use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::Quiz;
use crate::models::score::{QuestionFeedback, ScoreSummary};
use crate::models::session::{GenerationTicket, Material, SessionPhase, SessionState};
use crate::services::grading_service::GradingService;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 6 * 60 * 60;
const MAX_SESSION_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Sessions keyed by id. Each session owns its quiz and answers; the lock only
/// guards the map and is never held across an await. Sessions idle for longer
/// than `ttl` are dropped when a new session is created.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SessionState>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl_secs(DEFAULT_SESSION_TTL_SECS)
    }

    pub fn with_ttl_secs(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.min(MAX_SESSION_TTL_SECS) as i64),
        }
    }

    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SessionState) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| Error::Internal("session store mutex poisoned".to_string()))?;
        let session = guard
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))?;
        f(session)
    }

    pub fn create(&self) -> Result<SessionState> {
        let session = SessionState::new(Uuid::new_v4());
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| Error::Internal("session store mutex poisoned".to_string()))?;
        let expired = evict_idle(&mut guard, self.ttl);
        if expired > 0 {
            tracing::info!(expired, "Idle sessions evicted");
        }
        guard.insert(session.id, session.clone());
        tracing::info!(session_id = %session.id, active = guard.len(), "Session created");
        Ok(session)
    }

    pub fn get(&self, id: Uuid) -> Result<SessionState> {
        self.with_session(id, |s| Ok(s.clone()))
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| Error::Internal("session store mutex poisoned".to_string()))?;
        guard
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))
    }

    pub fn provide_material(&self, id: Uuid, material: Material) -> Result<SessionState> {
        self.with_session(id, |s| {
            tracing::info!(session_id = %id, kind = material.kind(), "Material provided; quiz reset");
            s.provide_material(material);
            Ok(s.clone())
        })
    }

    pub fn clear_material(&self, id: Uuid) -> Result<SessionState> {
        self.with_session(id, |s| {
            s.clear_material();
            Ok(s.clone())
        })
    }

    pub fn begin_generation(&self, id: Uuid) -> Result<GenerationTicket> {
        self.with_session(id, |s| s.begin_generation())
    }

    pub fn complete_generation(
        &self,
        id: Uuid,
        ticket: &GenerationTicket,
        quiz: Quiz,
    ) -> Result<bool> {
        self.with_session(id, |s| Ok(s.complete_generation(ticket, quiz)))
    }

    pub fn fail_generation(&self, id: Uuid, ticket: &GenerationTicket) -> Result<()> {
        self.with_session(id, |s| {
            s.fail_generation(ticket);
            Ok(())
        })
    }

    pub fn record_answer(&self, id: Uuid, index: usize, answer: String) -> Result<SessionState> {
        self.with_session(id, |s| {
            s.record_answer(index, answer)?;
            Ok(s.clone())
        })
    }

    /// Recomputed on every call.
    pub fn score(&self, id: Uuid) -> Result<(ScoreSummary, Vec<QuestionFeedback>)> {
        self.with_session(id, |s| {
            let answers = s.answers.clone();
            let quiz = s.mark_scored()?;
            Ok((
                GradingService::score(quiz, &answers),
                GradingService::feedback(quiz, &answers),
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A session still waiting on the model is never evicted.
fn evict_idle(sessions: &mut HashMap<Uuid, SessionState>, ttl: Duration) -> usize {
    let cutoff = Utc::now() - ttl;
    let before = sessions.len();
    sessions.retain(|_, s| s.phase == SessionPhase::Generating || s.updated_at > cutoff);
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create().unwrap();
        let b = store.create().unwrap();

        store
            .provide_material(a.id, Material::Text { body: "rivers".into(), file_name: None })
            .unwrap();

        assert_eq!(store.get(a.id).unwrap().phase, SessionPhase::MaterialProvided);
        assert_eq!(store.get(b.id).unwrap().phase, SessionPhase::Idle);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        assert!(matches!(store.get(Uuid::new_v4()), Err(Error::NotFound(_))));
        assert!(matches!(store.remove(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[test]
    fn scoring_without_quiz_is_rejected() {
        let store = SessionStore::new();
        let s = store.create().unwrap();
        assert!(matches!(store.score(s.id), Err(Error::BadRequest(_))));
    }

    #[test]
    fn removed_session_is_gone() {
        let store = SessionStore::new();
        let s = store.create().unwrap();
        store.remove(s.id).unwrap();
        assert!(store.is_empty());
    }

    fn age(store: &SessionStore, id: Uuid, idle_secs: i64) {
        store
            .with_session(id, |s| {
                s.updated_at = Utc::now() - Duration::seconds(idle_secs);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn idle_sessions_are_evicted_on_create() {
        let store = SessionStore::with_ttl_secs(60);
        let stale = store.create().unwrap();
        let fresh = store.create().unwrap();
        age(&store, stale.id, 120);
        age(&store, fresh.id, 30);

        let newest = store.create().unwrap();

        assert!(matches!(store.get(stale.id), Err(Error::NotFound(_))));
        assert!(store.get(fresh.id).is_ok());
        assert!(store.get(newest.id).is_ok());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn generating_sessions_survive_eviction() {
        let store = SessionStore::with_ttl_secs(60);
        let s = store.create().unwrap();
        store
            .provide_material(s.id, Material::Text { body: "rivers".into(), file_name: None })
            .unwrap();
        store.begin_generation(s.id).unwrap();
        age(&store, s.id, 600);

        store.create().unwrap();
        assert_eq!(store.get(s.id).unwrap().phase, SessionPhase::Generating);
    }
}
