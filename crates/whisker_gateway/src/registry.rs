use crate::connection::{Transport, UdpPeer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Live connections of one transport.
///
/// Dispatchers iterate over a snapshot; entries are removed only by [`Registry::reap`].
pub struct Registry<C> {
    entries: RwLock<Vec<Arc<C>>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<C: Transport> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, connection: Arc<C>) {
        self.entries.write().await.push(connection);
    }

    pub async fn snapshot(&self) -> Vec<Arc<C>> {
        self.entries.read().await.clone()
    }

    /// Like [`snapshot`](Self::snapshot), without entries already closed.
    pub async fn open_snapshot(&self) -> Vec<Arc<C>> {
        let entries = self.entries.read().await;
        entries.iter().filter(|c| c.is_open()).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every closed entry. Returns how many were removed.
    pub async fn reap(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|c| {
            let open = c.is_open();
            if !open {
                tracing::info!("Connection lost: {}", c.peer_addr());
            }
            open
        });
        before - entries.len()
    }
}

impl Registry<UdpPeer> {
    /// The open peer for `addr`, created on its first datagram.
    pub async fn peer_for(&self, addr: SocketAddr, create: impl FnOnce() -> UdpPeer) -> Arc<UdpPeer> {
        if let Some(peer) = self.find_open(addr).await {
            return peer;
        }

        let mut entries = self.entries.write().await;
        // Another datagram from the same peer may have won the race
        if let Some(peer) = entries.iter().find(|p| p.is_open() && p.peer_addr() == addr) {
            return Arc::clone(peer);
        }
        let peer = Arc::new(create());
        entries.push(Arc::clone(&peer));
        tracing::info!("New UDP peer: {}", addr);
        peer
    }

    async fn find_open(&self, addr: SocketAddr) -> Option<Arc<UdpPeer>> {
        self.entries
            .read()
            .await
            .iter()
            .find(|p| p.is_open() && p.peer_addr() == addr)
            .cloned()
    }

    /// Close peers that have been silent for at least `idle`; the next reap drops them.
    pub async fn expire_idle(&self, idle: Duration) {
        for peer in self.open_snapshot().await {
            if peer.idle_for() >= idle {
                tracing::debug!("UDP peer {} idle for {:?}", peer.peer_addr(), peer.idle_for());
                peer.close().await;
            }
        }
    }
}
