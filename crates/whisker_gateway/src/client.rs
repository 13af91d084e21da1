//! Small clients for both channels, used by the CLI and the integration tests.

use crate::codec;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, ToSocketAddrs, UdpSocket};

const READ_CHUNK: usize = 1024;

/// Pets over TCP. One connection can carry any number of requests.
pub struct PetClient {
    stream: TcpStream,
}

impl PetClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context("Failed to connect to the pet channel")?;
        Ok(Self { stream })
    }

    /// Send raw bytes as they are, fragments included.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .context("Failed to send to the cat")
    }

    pub async fn pet(&mut self, names: &[&str]) -> Result<()> {
        let mut request = Vec::new();
        for name in names {
            request.extend(codec::encode(name)?);
        }
        self.send(&request).await
    }

    /// `Ok(None)` if the cat said nothing within `timeout`.
    pub async fn read_response(&mut self, timeout: Duration) -> Result<Option<String>> {
        let mut buf = vec![0u8; READ_CHUNK];
        match tokio::time::timeout(timeout, self.stream.read(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => bail!("The cat closed the connection"),
            Ok(Ok(n)) => Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned())),
            Ok(Err(e)) => Err(e).context("Failed to read from the cat"),
        }
    }
}

/// Meals over UDP, from a socket bound to an ephemeral local port.
pub struct FeedClient {
    socket: UdpSocket,
}

impl FeedClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let target = lookup_host(addr)
            .await
            .context("Failed to resolve the feed channel")?
            .next()
            .context("Feed channel address resolved to nothing")?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

        let socket = UdpSocket::bind(local)
            .await
            .context("Failed to bind a local UDP socket")?;
        socket
            .connect(target)
            .await
            .context("Failed to connect to the feed channel")?;
        Ok(Self { socket })
    }

    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send(bytes)
            .await
            .context("Failed to send to the cat")?;
        Ok(())
    }

    pub async fn feed(&self, name: &str, food: &str) -> Result<()> {
        let request = codec::encode(&format!("{} - {}", name, food))?;
        self.send(&request).await
    }

    /// `Ok(None)` if no reply arrived within `timeout`.
    pub async fn read_response(&self, timeout: Duration) -> Result<Option<String>> {
        let mut buf = vec![0u8; 65_535];
        match tokio::time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(n)) => Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned())),
            Ok(Err(e)) => Err(e).context("Failed to read from the cat"),
        }
    }
}
