//! Registry of online sessions
//!
//! Maps display name → session. Names are unique; every check-and-modify
//! happens under a single write lock. Lock scope covers map access only,
//! callers never hold it across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::AppError;
use crate::session::Session;
use crate::types::Presence;

#[derive(Debug, Default)]
pub struct Registry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly connected session under its current name
    pub fn register(&self, session: Arc<Session>) -> Result<(), AppError> {
        let mut sessions = self.sessions.write();
        let name = session.name();
        if sessions.contains_key(&name) {
            return Err(AppError::NameTaken);
        }
        sessions.insert(name, session);
        debug!("Online sessions: {}", sessions.len());
        Ok(())
    }

    /// Move `session` to `new_name`, returning its previous name
    ///
    /// Fails without touching anything if the name is already registered,
    /// including when it is the session's own current name.
    pub fn rename(&self, session: &Arc<Session>, new_name: &str) -> Result<String, AppError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(new_name) {
            return Err(AppError::NameTaken);
        }

        let old_name = session.name();
        let owned = sessions
            .get(&old_name)
            .is_some_and(|current| current.id == session.id);
        if !owned {
            // Already unregistered: nothing to rename
            return Err(AppError::UserNotFound(old_name));
        }
        sessions.remove(&old_name);

        session.set_name(new_name.to_string());
        sessions.insert(new_name.to_string(), Arc::clone(session));
        info!("Session {} renamed '{}' -> '{}'", session.id, old_name, new_name);
        Ok(old_name)
    }

    /// Remove `session` if it is still registered
    ///
    /// Returns false when it was already gone, so teardown runs once.
    pub fn unregister(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.write();
        let name = session.name();
        let owned = sessions
            .get(&name)
            .is_some_and(|current| current.id == session.id);
        if owned {
            sessions.remove(&name);
            debug!("Online sessions: {}", sessions.len());
        }
        owned
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Session>, AppError> {
        self.sessions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UserNotFound(name.to_string()))
    }

    /// Every online user, ordered by name
    pub fn snapshot(&self) -> Vec<Presence> {
        let mut users: Vec<Presence> = self
            .sessions
            .read()
            .values()
            .map(|session| session.presence())
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    /// Point-in-time copy of all sessions, for delivery outside the lock
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
