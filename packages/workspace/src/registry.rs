//! Registry of live table sessions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lattice_table::{TableConfig, TableError};
use tracing::info;

use crate::session::TableSession;

/// Manager for all active sessions, one per table id. Sessions are
/// created on demand and shared between connections.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<tokio::sync::RwLock<TableSession>>>>,
    config: TableConfig,
}

impl SessionRegistry {
    pub fn new(config: TableConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get or create the session for a table id.
    pub fn get_or_create(&self, table_id: &str) -> Arc<tokio::sync::RwLock<TableSession>> {
        // Try read lock first
        {
            let sessions = self.sessions.read().unwrap();
            if let Some(session) = sessions.get(table_id) {
                return session.clone();
            }
        }

        // Need to create - acquire write lock
        let mut sessions = self.sessions.write().unwrap();

        // Double-check (another thread may have created it)
        if let Some(session) = sessions.get(table_id) {
            return session.clone();
        }

        info!(table_id, "creating table session");
        let session = Arc::new(tokio::sync::RwLock::new(TableSession::new(
            table_id.to_string(),
            self.config.clone(),
        )));
        sessions.insert(table_id.to_string(), session.clone());
        session
    }

    /// Get or create a session seeded from persisted state. An existing
    /// live session wins over the persisted copy.
    pub fn get_or_create_with_state(
        &self,
        table_id: &str,
        state: &[u8],
    ) -> Result<Arc<tokio::sync::RwLock<TableSession>>, TableError> {
        {
            let sessions = self.sessions.read().unwrap();
            if let Some(session) = sessions.get(table_id) {
                return Ok(session.clone());
            }
        }

        let mut sessions = self.sessions.write().unwrap();

        if let Some(session) = sessions.get(table_id) {
            return Ok(session.clone());
        }

        info!(table_id, "restoring table session from persisted state");
        let session = Arc::new(tokio::sync::RwLock::new(TableSession::from_state(
            table_id.to_string(),
            state,
            self.config.clone(),
        )?));
        sessions.insert(table_id.to_string(), session.clone());
        Ok(session)
    }

    /// Remove a session (when all clients disconnect).
    pub fn remove(&self, table_id: &str) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(table_id);
    }

    /// Get session if it exists.
    pub fn get(&self, table_id: &str) -> Option<Arc<tokio::sync::RwLock<TableSession>>> {
        let sessions = self.sessions.read().unwrap();
        sessions.get(table_id).cloned()
    }
}
