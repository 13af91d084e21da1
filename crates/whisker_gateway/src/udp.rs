//! Feed channel: receive loop and the per-tick dispatch loop.

use crate::connection::{Transport, UdpPeer};
use crate::protocol;
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use whisker_limbic::Cat;

const MAX_DATAGRAM: usize = 65_535;

pub(crate) async fn receive_loop(
    socket: Arc<UdpSocket>,
    registry: Arc<Registry<UdpPeer>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((n, addr)) => {
                    tracing::trace!("{} bytes from {}", n, addr);
                    let peer = registry
                        .peer_for(addr, || UdpPeer::new(Arc::clone(&socket), addr))
                        .await;
                    peer.push(&buf[..n]);
                }
                // ICMP port-unreachable from an earlier reply surfaces here on some platforms
                Err(e) => tracing::debug!("UDP receive failed: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("UDP receive loop stopped");
}

pub(crate) struct UdpDispatch {
    pub cat: Arc<Cat>,
    pub registry: Arc<Registry<UdpPeer>>,
    pub tick: Duration,
}

impl UdpDispatch {
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick.max(Duration::from_millis(1)));
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    for peer in self.registry.snapshot().await {
                        if peer.is_open() {
                            self.serve(&peer).await;
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("UDP dispatch loop stopped");
    }

    async fn serve(&self, peer: &UdpPeer) {
        let bytes = peer.take_inbox();
        if bytes.is_empty() {
            return;
        }

        let mut response = protocol::answer_feeds(&self.cat, peer.decode(&bytes)).await;
        if peer.has_pending_fragment() {
            response.push_str(&protocol::amused(peer.bump_amusement()));
        } else {
            peer.reset_amusement();
        }

        if response.is_empty() {
            return;
        }
        if let Err(e) = peer.write(response.as_bytes()).await {
            tracing::debug!("Reply to {} failed: {}", peer.peer_addr(), e);
        }
    }
}
