use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    connection::GatewayConnection,
    tunnel::{SshError, TunnelTransport},
};

/// Process-wide registry of live control channels, keyed by gateway host.
/// One mutex makes `add`/`get`/`remove` linearizable; `add` serializes the
/// handshake so at most one connection per host ever exists.
pub struct ConnectionPool {
    transport: Arc<dyn TunnelTransport>,
    connections: Mutex<HashMap<String, Arc<GatewayConnection>>>,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(transport: Arc<dyn TunnelTransport>) -> Self {
        Self {
            transport,
            connections: Mutex::default(),
        }
    }

    /// Open a connection to `host`, or return the existing one. Nothing is
    /// stored when the handshake fails.
    pub async fn add(
        &self,
        host: &str,
        ssh_private_key: &str,
    ) -> Result<Arc<GatewayConnection>, SshError> {
        let mut connections = self.connections.lock().await;
        if let Some(connection) = connections.get(host) {
            return Ok(Arc::clone(connection));
        }
        let tunnel = self.transport.open(host, ssh_private_key).await?;
        let connection = Arc::new(GatewayConnection::new(host, tunnel));
        connections.insert(host.to_string(), Arc::clone(&connection));
        Ok(connection)
    }

    pub async fn get(&self, host: &str) -> Option<Arc<GatewayConnection>> {
        self.connections.lock().await.get(host).map(Arc::clone)
    }

    /// Close and drop the connection for `host`. Unknown hosts are a no-op.
    /// Handles cloned out earlier stay valid.
    pub async fn remove(&self, host: &str) {
        let removed = self.connections.lock().await.remove(host);
        if let Some(connection) = removed {
            connection.close().await;
        }
    }

    /// Snapshot of the current connections. Entries may be removed
    /// concurrently; callers hold their own handles.
    pub async fn all(&self) -> Vec<Arc<GatewayConnection>> {
        self.connections
            .lock()
            .await
            .values()
            .map(Arc::clone)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use claims::{assert_none, assert_ok, assert_some};

    use super::*;
    use crate::testing::FakeTransport;

    #[tokio::test]
    async fn test_add_is_idempotent_per_host() {
        let transport = FakeTransport::new();
        let pool = ConnectionPool::new(transport.clone());

        let first = assert_ok!(pool.add("203.0.113.10", "key").await);
        let second = assert_ok!(pool.add("203.0.113.10", "key").await);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.all().await.len(), 1);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_handshake_stores_nothing() {
        let transport = FakeTransport::new();
        transport.set_unreachable("203.0.113.10");
        let pool = ConnectionPool::new(transport.clone());

        assert!(pool.add("203.0.113.10", "key").await.is_err());
        assert_none!(pool.get("203.0.113.10").await);
        assert!(pool.all().await.is_empty());

        // the host becoming reachable makes a later add succeed
        transport.set_reachable("203.0.113.10");
        assert_ok!(pool.add("203.0.113.10", "key").await);
        assert_some!(pool.get("203.0.113.10").await);
    }

    #[tokio::test]
    async fn test_remove_is_safe_on_unknown_hosts() {
        let transport = FakeTransport::new();
        let pool = ConnectionPool::new(transport.clone());

        pool.remove("198.51.100.1").await;

        assert_ok!(pool.add("203.0.113.10", "key").await);
        let held = assert_some!(pool.get("203.0.113.10").await);
        pool.remove("203.0.113.10").await;
        assert_none!(pool.get("203.0.113.10").await);
        // a handle cloned out before removal stays usable
        assert_eq!(held.ip_address(), "203.0.113.10");
    }

    #[tokio::test]
    async fn test_all_returns_a_snapshot() {
        let transport = FakeTransport::new();
        let pool = ConnectionPool::new(transport.clone());
        assert_ok!(pool.add("203.0.113.10", "key").await);
        assert_ok!(pool.add("203.0.113.11", "key").await);

        let snapshot = pool.all().await;
        pool.remove("203.0.113.10").await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(pool.all().await.len(), 1);
    }
}
