use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dashboard::session::{Session, SessionDeps};
use crate::error::{Error, Result};

/// Live sessions keyed by id.
pub struct SessionRegistry {
    deps: SessionDeps,
    default_username: Option<String>,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps, default_username: Option<String>) -> Self {
        Self {
            deps,
            default_username,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a session for `username`, or the configured user when omitted.
    pub async fn create(&self, username: Option<String>) -> Result<Arc<Session>> {
        let username = username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .or_else(|| self.default_username.clone())
            .ok_or_else(|| Error::InvalidArgument("a GitHub username is required".to_string()))?;

        // rejects names that could not be stored
        self.deps.store.path_for(&username)?;

        let session = Arc::new(Session::new(username, self.deps.clone()));
        self.sessions.write().await.insert(session.id(), session.clone());
        tracing::info!("Opened session {} for {}", session.id(), session.username());
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))
    }

    /// Signals shutdown to any in-flight action and forgets the session.
    pub async fn close(&self, id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        session.close();
        tracing::info!("Closed session {}", id);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Closes every session, used on server shutdown.
    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.close();
        }
        if !sessions.is_empty() {
            tracing::info!("Closed {} session(s)", sessions.len());
        }
    }
}
