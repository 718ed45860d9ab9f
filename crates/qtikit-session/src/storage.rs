//! The storage collaborator boundary.
//!
//! Sessions persist as opaque snapshots; a backend only needs to move
//! those around. The in-memory backend round-trips snapshots through
//! JSON, the same shape a real backend would store.

use crate::error::StorageError;
use crate::session::{SessionSnapshot, TestSession};
use qtikit_types::testdef::AssessmentTest;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A backend holding persisted sessions, keyed by session id.
pub trait SessionStorage {
    /// Create, persist, and return a fresh session over a test. A caller
    /// may supply the id; otherwise the backend assigns one. A supplied
    /// id that is already stored is rejected.
    fn instantiate(
        &mut self,
        test: Arc<AssessmentTest>,
        seed: u64,
        session_id: Option<String>,
    ) -> Result<(String, TestSession), StorageError>;

    /// Persist the session's current snapshot under an id.
    fn persist(&mut self, session_id: &str, session: &TestSession) -> Result<(), StorageError>;

    /// Rebuild a persisted session.
    fn retrieve(
        &self,
        test: Arc<AssessmentTest>,
        session_id: &str,
    ) -> Result<TestSession, StorageError>;

    fn exists(&self, session_id: &str) -> bool;

    /// Remove a persisted session; false when the id is unknown.
    fn delete(&mut self, session_id: &str) -> bool;
}

/// In-memory backend storing sessions as JSON snapshots.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    next_id: u64,
    sessions: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn instantiate(
        &mut self,
        test: Arc<AssessmentTest>,
        seed: u64,
        session_id: Option<String>,
    ) -> Result<(String, TestSession), StorageError> {
        let id = match session_id {
            Some(id) => {
                if self.sessions.contains_key(&id) {
                    return Err(StorageError::AlreadyExists(id));
                }
                id
            }
            None => {
                self.next_id += 1;
                format!("session-{}", self.next_id)
            }
        };
        let session = TestSession::new(test, seed);
        self.persist(&id, &session)?;
        Ok((id, session))
    }

    fn persist(&mut self, session_id: &str, session: &TestSession) -> Result<(), StorageError> {
        let json = serde_json::to_string(&session.snapshot())?;
        self.sessions.insert(session_id.to_string(), json);
        Ok(())
    }

    fn retrieve(
        &self,
        test: Arc<AssessmentTest>,
        session_id: &str,
    ) -> Result<TestSession, StorageError> {
        let json = self
            .sessions
            .get(session_id)
            .ok_or_else(|| StorageError::NotFound(session_id.to_string()))?;
        let snapshot: SessionSnapshot = serde_json::from_str(json)?;
        Ok(TestSession::restore(test, snapshot)?)
    }

    fn exists(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    fn delete(&mut self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }
}
