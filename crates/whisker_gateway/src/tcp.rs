//! Pet channel: accept loop and dispatch loop.

use crate::connection::{StreamTransport, TcpConnection, Transport};
use crate::protocol::{self, ENOUGH_HAPPINESS};
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use whisker_limbic::Cat;

pub(crate) async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry<TcpConnection>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tracing::info!("New TCP connection: {}", addr);
                    registry.insert(Arc::new(TcpConnection::new(stream, addr))).await;
                }
                Err(e) => tracing::warn!("TCP accept failed: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("TCP accept loop stopped");
}

pub(crate) struct TcpDispatch {
    pub cat: Arc<Cat>,
    pub registry: Arc<Registry<TcpConnection>>,
    pub chunk: usize,
    pub read_timeout: Duration,
}

impl TcpDispatch {
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            // Closed entries wait for the reaper; serving none of them counts as idle
            let connections = self.registry.open_snapshot().await;
            if connections.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.read_timeout) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            }

            for conn in connections {
                self.serve(&conn).await;
            }
            tokio::task::yield_now().await;
        }
        tracing::debug!("TCP dispatch loop stopped");
    }

    async fn serve(&self, conn: &TcpConnection) {
        let bytes = match conn.read(self.chunk, self.read_timeout).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!("Read from {} failed: {}", conn.peer_addr(), e);
                return;
            }
        };
        tracing::trace!("{} bytes from {}", bytes.len(), conn.peer_addr());

        let response = protocol::answer_pets(&self.cat, conn.decode(&bytes)).await;
        if response.is_empty() {
            return;
        }
        if let Err(e) = conn.write(response.as_bytes()).await {
            tracing::debug!("Write to {} failed: {}", conn.peer_addr(), e);
            return;
        }

        let happiness = self.cat.happiness_scale().await;
        if happiness < ENOUGH_HAPPINESS {
            tracing::info!("The cat has had enough of {} (happiness {:.2})", conn.peer_addr(), happiness);
            conn.close().await;
        }
    }
}
