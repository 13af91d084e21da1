//! Transport capabilities and the two connection kinds.
//!
//! Every connection can be written to and closed. Only TCP streams can be
//! read on demand; UDP peers are fed by the receive loop into an inbox that the
//! dispatcher drains once per tick.

use crate::codec;
use crate::error::{ConnectionError, FramingResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};

#[async_trait]
pub trait Transport: Send + Sync {
    fn peer_addr(&self) -> SocketAddr;

    fn is_open(&self) -> bool;

    /// Write the whole payload. A failure marks the connection closed.
    async fn write(&self, data: &[u8]) -> Result<(), ConnectionError>;

    async fn close(&self);
}

/// A transport that can be read on demand.
#[async_trait]
pub trait StreamTransport: Transport {
    /// Read at most `max` bytes. `Ok(None)` means nothing arrived within `timeout`.
    async fn read(&self, max: usize, timeout: Duration)
        -> Result<Option<Vec<u8>>, ConnectionError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// TCP
// ============================================================================

pub struct TcpConnection {
    addr: SocketAddr,
    reader: tokio::sync::Mutex<OwnedReadHalf>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    open: AtomicBool,
    carry: Mutex<Vec<u8>>,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            addr,
            reader: tokio::sync::Mutex::new(reader),
            writer: tokio::sync::Mutex::new(writer),
            open: AtomicBool::new(true),
            carry: Mutex::new(Vec::new()),
        }
    }

    /// Run the codec over `bytes` with this connection's carry-over, which is
    /// capped at [`codec::MAX_FRAGMENT_BYTES`].
    pub fn decode(&self, bytes: &[u8]) -> FramingResult<Vec<String>> {
        codec::decode(&mut lock(&self.carry), bytes)
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for TcpConnection {
    fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn write(&self, data: &[u8]) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(data).await {
            self.mark_closed();
            return Err(e.into());
        }
        Ok(())
    }

    async fn close(&self) {
        self.mark_closed();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!("Shutdown of {} failed: {}", self.addr, e);
        }
    }
}

#[async_trait]
impl StreamTransport for TcpConnection {
    async fn read(
        &self,
        max: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }

        let mut buf = vec![0u8; max.max(1)];
        let mut reader = self.reader.lock().await;
        match tokio::time::timeout(timeout, reader.read(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                self.mark_closed();
                Err(ConnectionError::Closed)
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Ok(Err(e)) => {
                self.mark_closed();
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// UDP
// ============================================================================

/// A logical connection synthesized per `(host, port)` of a UDP sender.
pub struct UdpPeer {
    addr: SocketAddr,
    socket: Arc<UdpSocket>,
    open: AtomicBool,
    inbox: Mutex<Vec<u8>>,
    carry: Mutex<Vec<u8>>,
    amusement: AtomicU64,
    last_seen: Mutex<Instant>,
}

impl UdpPeer {
    pub fn new(socket: Arc<UdpSocket>, addr: SocketAddr) -> Self {
        Self {
            addr,
            socket,
            open: AtomicBool::new(true),
            inbox: Mutex::new(Vec::new()),
            carry: Mutex::new(Vec::new()),
            amusement: AtomicU64::new(0),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Queue a datagram for the next dispatch tick.
    pub fn push(&self, datagram: &[u8]) {
        lock(&self.inbox).extend_from_slice(datagram);
        *lock(&self.last_seen) = Instant::now();
    }

    /// Take everything received since the last tick.
    pub fn take_inbox(&self) -> Vec<u8> {
        std::mem::take(&mut *lock(&self.inbox))
    }

    /// Same framing as [`TcpConnection::decode`], across datagrams.
    pub fn decode(&self, bytes: &[u8]) -> FramingResult<Vec<String>> {
        codec::decode(&mut lock(&self.carry), bytes)
    }

    pub fn has_pending_fragment(&self) -> bool {
        !lock(&self.carry).is_empty()
    }

    /// Current amusement count; the stored value moves on by one.
    pub fn bump_amusement(&self) -> u64 {
        self.amusement.fetch_add(1, Ordering::SeqCst)
    }

    pub fn reset_amusement(&self) {
        self.amusement.store(0, Ordering::SeqCst);
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.last_seen).elapsed()
    }
}

#[async_trait]
impl Transport for UdpPeer {
    fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn write(&self, data: &[u8]) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }
        if let Err(e) = self.socket.send_to(data, self.addr).await {
            self.open.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
