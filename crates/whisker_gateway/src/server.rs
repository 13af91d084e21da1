use crate::connection::{TcpConnection, UdpPeer};
use crate::registry::Registry;
use crate::tcp::{self, TcpDispatch};
use crate::udp::{self, UdpDispatch};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use whisker_core::ServerConfig;
use whisker_limbic::Cat;

/// Signals every loop of a running [`CatService`] to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        // Receivers may already be gone if the service finished on its own
        let _ = self.tx.send(true);
    }
}

/// The cat behind two sockets.
///
/// - TCP (`tcp_port`): `@name~` pets, answered per read
/// - UDP (`udp_port`): `@name - food~` meals, answered once per tick
///
/// `run` drives six tasks: both receive sides, both dispatchers, the
/// connection reaper and the cat's mood heartbeat.
pub struct CatService {
    cat: Arc<Cat>,
    config: ServerConfig,
    tcp_listener: TcpListener,
    udp_socket: Arc<UdpSocket>,
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    tcp_registry: Arc<Registry<TcpConnection>>,
    udp_registry: Arc<Registry<UdpPeer>>,
    shutdown: ShutdownHandle,
}

impl CatService {
    /// Bind both sockets. Port 0 picks a free port; see [`tcp_addr`](Self::tcp_addr).
    pub async fn bind(config: &ServerConfig, cat: Arc<Cat>) -> Result<Self> {
        let tcp_bind = format!("{}:{}", config.host, config.tcp_port);
        let tcp_listener = TcpListener::bind(&tcp_bind)
            .await
            .with_context(|| format!("Failed to bind TCP {}", tcp_bind))?;
        let tcp_addr = tcp_listener.local_addr().context("Failed to read TCP address")?;

        let udp_bind = format!("{}:{}", config.host, config.udp_port);
        let udp_socket = UdpSocket::bind(&udp_bind)
            .await
            .with_context(|| format!("Failed to bind UDP {}", udp_bind))?;
        let udp_addr = udp_socket.local_addr().context("Failed to read UDP address")?;

        tracing::info!("Pet channel listening on tcp://{}", tcp_addr);
        tracing::info!("Feed channel listening on udp://{}", udp_addr);

        let (tx, _rx) = watch::channel(false);
        Ok(Self {
            cat,
            config: config.clone(),
            tcp_listener,
            udp_socket: Arc::new(udp_socket),
            tcp_addr,
            udp_addr,
            tcp_registry: Arc::new(Registry::new()),
            udp_registry: Arc::new(Registry::new()),
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        })
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// The live pet-channel connections, shared with the running service.
    pub fn tcp_connections(&self) -> Arc<Registry<TcpConnection>> {
        Arc::clone(&self.tcp_registry)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until stopped.
    pub async fn run(self) -> Result<()> {
        let Self {
            cat,
            config,
            tcp_listener,
            udp_socket,
            tcp_registry,
            udp_registry,
            shutdown,
            ..
        } = self;
        let signal = || shutdown.tx.subscribe();

        let tasks = vec![
            tokio::spawn(tcp::accept_loop(tcp_listener, Arc::clone(&tcp_registry), signal())),
            tokio::spawn(udp::receive_loop(udp_socket, Arc::clone(&udp_registry), signal())),
            tokio::spawn(
                TcpDispatch {
                    cat: Arc::clone(&cat),
                    registry: Arc::clone(&tcp_registry),
                    chunk: config.read_chunk_bytes,
                    read_timeout: config.read_timeout(),
                }
                .run(signal()),
            ),
            tokio::spawn(
                UdpDispatch {
                    cat: Arc::clone(&cat),
                    registry: Arc::clone(&udp_registry),
                    tick: config.tick_interval(),
                }
                .run(signal()),
            ),
            tokio::spawn(reap_loop(
                tcp_registry,
                udp_registry,
                config.tick_interval(),
                config.peer_idle(),
                signal(),
            )),
            cat.spawn_mood_loop(signal()),
        ];

        tracing::info!("The cat is awake");
        for task in tasks {
            task.await.context("Service task panicked")?;
        }
        tracing::info!("The cat is asleep");
        Ok(())
    }
}

async fn reap_loop(
    tcp: Arc<Registry<TcpConnection>>,
    udp: Arc<Registry<UdpPeer>>,
    tick: Duration,
    peer_idle: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {
                udp.expire_idle(peer_idle).await;
                let reaped = tcp.reap().await + udp.reap().await;
                if reaped > 0 {
                    tracing::debug!("Reaped {} connections", reaped);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Reaper stopped");
}
