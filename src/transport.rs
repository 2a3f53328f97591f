//! Line transport used by the session client.
//!
//! [`Transport`] is the seam between the APRS-IS session state machine and the socket.
//! Methods take `&self` so the receive loop and the re-login timer can share one
//! transport; implementations serialize reads and writes internally.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{AprsError, Result};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<()>;

    /// Next line without its terminator. `Ok(None)` when no complete line arrived in time
    /// or the peer closed the connection.
    async fn receive_line(&self) -> Result<Option<String>>;

    /// Send one line; the transport appends the terminator
    async fn send_line(&self, line: &str) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<()>;
}

/// Longest line kept, terminator included. Longer lines are dropped up to their terminator.
const MAX_LINE_LEN: usize = 512;

struct LineReader {
    reader: BufReader<OwnedReadHalf>,
    /// Bytes of a line still being read when a read timed out
    pending: Vec<u8>,
    /// Skipping the rest of an overlong line
    discarding: bool,
}

/// TCP transport with CRLF line framing
pub struct TcpTransport {
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    read_timeout: Duration,
}

impl TcpTransport {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            read_timeout,
        }
    }

    /// Resolve `host:port`, preferring IPv4 addresses, in random order
    async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        let server_address = format!("{}:{}", host, port);
        let all_addrs: Vec<_> = tokio::net::lookup_host(&server_address).await?.collect();
        if all_addrs.is_empty() {
            return Err(AprsError::Connection(std::io::Error::other(format!(
                "DNS resolution returned no addresses for {}",
                server_address
            ))));
        }

        let ipv4_addrs: Vec<_> = all_addrs
            .iter()
            .filter(|addr| addr.is_ipv4())
            .cloned()
            .collect();

        let mut addrs = if ipv4_addrs.is_empty() {
            warn!(
                "No IPv4 addresses found for {}, falling back to all addresses",
                server_address
            );
            all_addrs
        } else {
            debug!(
                "DNS resolved {} to {} IPv4 address(es)",
                server_address,
                ipv4_addrs.len()
            );
            ipv4_addrs
        };

        {
            use rand::seq::SliceRandom;
            let mut rng = rand::rng();
            addrs.shuffle(&mut rng);
        }

        Ok(addrs)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let addrs = Self::resolve(host, port).await?;

        let mut last_error = None;
        for addr in &addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    info!("Connected to APRS-IS server at {}", addr);
                    metrics::counter!("aprs.connection.established_total").increment(1);

                    let (reader, writer) = stream.into_split();
                    *self.reader.lock().await = Some(LineReader {
                        reader: BufReader::new(reader),
                        pending: Vec::new(),
                        discarding: false,
                    });
                    *self.writer.lock().await = Some(writer);
                    self.connected.store(true, Ordering::Release);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(AprsError::Connection(last_error.unwrap_or_else(|| {
            std::io::Error::other(format!("no address to connect to for {}:{}", host, port))
        })))
    }

    async fn receive_line(&self) -> Result<Option<String>> {
        let mut guard = self.reader.lock().await;
        let line_reader = guard
            .as_mut()
            .ok_or_else(|| AprsError::Connection(std::io::ErrorKind::NotConnected.into()))?;

        let LineReader {
            reader,
            pending,
            discarding,
        } = line_reader;

        let limit = (MAX_LINE_LEN - pending.len()) as u64;
        let read = timeout(
            self.read_timeout,
            (&mut *reader).take(limit).read_until(b'\n', pending),
        )
        .await;

        match read {
            Err(_) => {
                trace!("No line within {:?}", self.read_timeout);
                Ok(None)
            }
            Ok(Ok(0)) => {
                if !pending.is_empty() {
                    debug!(
                        "Dropping unterminated line at end of stream: {:?}",
                        String::from_utf8_lossy(pending)
                    );
                    pending.clear();
                }
                info!("APRS-IS server closed the connection");
                self.connected.store(false, Ordering::Release);
                Ok(None)
            }
            Ok(Ok(_)) if pending.last() != Some(&b'\n') => {
                // Either the length cap was hit or the stream ended mid-line
                if pending.len() >= MAX_LINE_LEN {
                    if !*discarding {
                        warn!("Dropping line longer than {} bytes", MAX_LINE_LEN);
                    }
                    *discarding = true;
                    pending.clear();
                }
                Ok(None)
            }
            Ok(Ok(_)) => {
                let bytes = std::mem::take(pending);
                if std::mem::take(discarding) {
                    trace!("Skipped the tail of an overlong line");
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(&bytes);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
            Ok(Err(e)) => {
                self.connected.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    async fn send_line(&self, line: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| AprsError::Connection(std::io::ErrorKind::NotConnected.into()))?;

        let framed = format!("{}\r\n", line);
        let written = async {
            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            self.connected.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);

        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(e) = writer.shutdown().await
        {
            debug!("Error shutting down APRS-IS socket: {}", e);
        }
        // A reader still blocked in receive_line keeps its half until the read returns
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        info!("Disconnected from APRS-IS server");
        Ok(())
    }
}
