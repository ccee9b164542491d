//! Live editing sessions.
//!
//! A session pairs one shared table document with the set of connected
//! clients. Incoming updates are applied to the document and fanned out
//! to every other client, followed by the freshly projected view so thin
//! clients can render without running the projection themselves.

use lattice_table::{TableConfig, TableDocument, TableError};
use serde_json::json;

/// Client connection in a table session.
#[derive(Clone)]
pub struct SessionClient {
    pub client_id: String,
    pub sender: tokio::sync::mpsc::Sender<SessionBroadcast>,
}

/// Broadcast message to session clients.
#[derive(Clone, Debug)]
pub enum SessionBroadcast {
    /// Remote update from another client
    RemoteUpdate {
        update: Vec<u8>,
        origin_client_id: String,
    },
    /// Projected view after a committed change
    ViewRefresh {
        view_json: String,
        version: u64,
        origin_client_id: String,
    },
}

/// A collaborative editing session for a single table.
pub struct TableSession {
    pub table_id: String,
    pub document: TableDocument,
    pub clients: Vec<SessionClient>,
}

impl TableSession {
    pub fn new(table_id: String, config: TableConfig) -> Self {
        Self {
            table_id,
            document: TableDocument::new(config),
            clients: Vec::new(),
        }
    }

    pub fn from_state(
        table_id: String,
        state: &[u8],
        config: TableConfig,
    ) -> Result<Self, TableError> {
        Ok(Self {
            table_id,
            document: TableDocument::from_state(state, config)?,
            clients: Vec::new(),
        })
    }

    /// Add a client to the session.
    pub fn add_client(&mut self, client: SessionClient) {
        // Remove any existing client with same ID
        self.clients.retain(|c| c.client_id != client.client_id);
        self.clients.push(client);
    }

    /// Remove a client from the session.
    pub fn remove_client(&mut self, client_id: &str) {
        self.clients.retain(|c| c.client_id != client_id);
    }

    /// Apply an update from a client and relay it, plus the resulting
    /// view, to everyone else.
    pub async fn handle_update(
        &mut self,
        update: &[u8],
        origin_client_id: &str,
    ) -> Result<(), TableError> {
        self.document.apply_update(update)?;

        self.broadcast(
            SessionBroadcast::RemoteUpdate {
                update: update.to_vec(),
                origin_client_id: origin_client_id.to_string(),
            },
            Some(origin_client_id),
        )
        .await;

        let view_json = json!(self.document.view()).to_string();
        self.broadcast(
            SessionBroadcast::ViewRefresh {
                view_json,
                version: self.document.version(),
                origin_client_id: origin_client_id.to_string(),
            },
            None,
        )
        .await;
        Ok(())
    }

    /// Broadcast a message to all clients except the origin.
    pub async fn broadcast(&self, msg: SessionBroadcast, exclude_client: Option<&str>) {
        for client in &self.clients {
            if Some(client.client_id.as_str()) == exclude_client {
                continue;
            }
            // Ignore send errors (client may have disconnected)
            let _ = client.sender.send(msg.clone()).await;
        }
    }

    /// Get number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_table::ColumnSpec;

    fn client(id: &str) -> (SessionClient, tokio::sync::mpsc::Receiver<SessionBroadcast>) {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        (
            SessionClient {
                client_id: id.to_string(),
                sender: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_update_relays_to_other_clients_only() {
        let mut session = TableSession::new("t1".to_string(), TableConfig::default());
        let (alice, mut alice_rx) = client("alice");
        let (bob, mut bob_rx) = client("bob");
        session.add_client(alice);
        session.add_client(bob);

        // alice's replica makes an edit and sends the delta
        let mut replica = TableDocument::new(TableConfig::default());
        replica.insert_columns(0, &[ColumnSpec::new("Name")]);
        let update = replica.encode_state();

        session.handle_update(&update, "alice").await.unwrap();

        // bob gets the raw update, alice does not
        match bob_rx.try_recv().unwrap() {
            SessionBroadcast::RemoteUpdate {
                origin_client_id, ..
            } => assert_eq!(origin_client_id, "alice"),
            other => panic!("unexpected message: {other:?}"),
        }
        // both get the refreshed view
        assert!(matches!(
            bob_rx.try_recv().unwrap(),
            SessionBroadcast::ViewRefresh { .. }
        ));
        match alice_rx.try_recv().unwrap() {
            SessionBroadcast::ViewRefresh { view_json, .. } => {
                assert!(view_json.contains("\"Name\""));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(alice_rx.try_recv().is_err());

        assert_eq!(session.document.column_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_client() {
        let mut session = TableSession::new("t1".to_string(), TableConfig::default());
        let (first, _rx1) = client("alice");
        let (second, _rx2) = client("alice");
        session.add_client(first);
        session.add_client(second);
        assert_eq!(session.client_count(), 1);

        session.remove_client("alice");
        assert_eq!(session.client_count(), 0);
    }
}
