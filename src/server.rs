use crate::{
    config::DnsConfig,
    dns::{DNSPacket, MAX_UDP_PAYLOAD, header::DNSHeader},
    error::{DnsError, Result},
    metrics::DnsMetrics,
    resolver::Resolver,
    zone::ZoneStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Largest UDP datagram read from a client
const UDP_RECV_BUFFER: usize = 4096;

/// Turns raw request bytes into raw response bytes against the currently
/// published snapshot.
pub struct QueryHandler {
    store: Arc<ZoneStore>,
    resolver: Resolver,
    metrics: Option<Arc<DnsMetrics>>,
}

impl QueryHandler {
    pub fn new(store: Arc<ZoneStore>, resolver: Resolver) -> Self {
        Self {
            store,
            resolver,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DnsMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decode and answer one message. `None` means the message is dropped.
    pub fn answer(&self, buf: &[u8], protocol: &str) -> Option<DNSPacket> {
        let started = Instant::now();

        let query = match DNSPacket::parse(buf) {
            Ok(query) => query,
            Err(e) => {
                self.record_malformed(protocol, "parse_error");
                return match DNSHeader::parse(buf) {
                    Ok(header) if !header.qr => {
                        debug!(
                            "Failed to decode query id={} ({}), returning FORMERR",
                            header.id, e
                        );
                        Some(self.resolver.format_error(&header))
                    }
                    _ => {
                        debug!(
                            "Dropping undecodable message: {} (packet length: {} bytes)",
                            e,
                            buf.len()
                        );
                        None
                    }
                };
            }
        };

        if query.header.qr {
            debug!("Received DNS response instead of query, dropping");
            self.record_malformed(protocol, "not_query");
            return None;
        }

        let snapshot = self.store.current();
        let resolution = self.resolver.resolve(&query, &snapshot);
        if let Some(metrics) = &self.metrics {
            metrics.record_query(protocol, resolution.outcome, started.elapsed());
        }
        Some(resolution.response)
    }

    /// Answer a UDP datagram, truncating replies that exceed 512 bytes
    pub fn handle_udp(&self, buf: &[u8]) -> Option<Vec<u8>> {
        let response = self.answer(buf, "udp")?;
        let bytes = self.encode(&response)?;
        if bytes.len() <= MAX_UDP_PAYLOAD {
            return Some(bytes);
        }

        debug!(
            "Response too large for UDP ({}>{} bytes), sending truncated response",
            bytes.len(),
            MAX_UDP_PAYLOAD
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_truncated_response("udp");
        }
        self.encode(&self.resolver.truncate(&response))
    }

    /// Answer a message received over TCP (without its length prefix)
    pub fn handle_tcp(&self, buf: &[u8]) -> Option<Vec<u8>> {
        let response = self.answer(buf, "tcp")?;
        let bytes = self.encode(&response)?;
        if bytes.len() <= u16::MAX as usize {
            return Some(bytes);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_truncated_response("tcp");
        }
        self.encode(&self.resolver.truncate(&response))
    }

    fn encode(&self, response: &DNSPacket) -> Option<Vec<u8>> {
        match response.serialize() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(
                    "Failed to serialize response id={}: {}",
                    response.header.id, e
                );
                None
            }
        }
    }

    fn record_malformed(&self, protocol: &str, error_type: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_malformed_packet(protocol, error_type);
        }
    }
}

/// Timeouts applied to TCP connections
#[derive(Debug, Clone, Copy)]
pub struct TcpTimeouts {
    pub read: Duration,
    pub write: Duration,
    pub idle: Duration,
}

impl From<&DnsConfig> for TcpTimeouts {
    fn from(config: &DnsConfig) -> Self {
        Self {
            read: config.read_timeout,
            write: config.write_timeout,
            idle: config.idle_timeout,
        }
    }
}

/// Run UDP server with graceful shutdown support
pub async fn run_udp_server(
    config: DnsConfig,
    handler: Arc<QueryHandler>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let sock = UdpSocket::bind(config.bind_addr).await?;
    serve_udp(sock, handler, shutdown_rx).await
}

/// Serve DNS on an already bound UDP socket
pub async fn serve_udp(
    sock: UdpSocket,
    handler: Arc<QueryHandler>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let sock = Arc::new(sock);
    info!("UDP DNS server listening on {}", sock.local_addr()?);

    let mut buf = vec![0u8; UDP_RECV_BUFFER];
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("UDP server received shutdown signal");
                break;
            }

            result = sock.recv_from(&mut buf) => {
                let (read_bytes, src_addr) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Failed to receive UDP datagram: {}", e);
                        continue;
                    }
                };

                let query_data = buf[..read_bytes].to_vec();
                let handler = handler.clone();
                let sock = sock.clone();

                tokio::spawn(async move {
                    if let Some(response) = handler.handle_udp(&query_data) {
                        if let Err(e) = sock.send_to(&response, src_addr).await {
                            error!("Failed to send UDP response to {}: {}", src_addr, e);
                        }
                    }
                });
            }
        }
    }

    Ok(())
}

/// Run TCP server with graceful shutdown support
pub async fn run_tcp_server(
    config: DnsConfig,
    handler: Arc<QueryHandler>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    serve_tcp(listener, handler, TcpTimeouts::from(&config), shutdown_rx).await
}

/// Serve DNS on an already bound TCP listener
pub async fn serve_tcp(
    listener: TcpListener,
    handler: Arc<QueryHandler>,
    timeouts: TcpTimeouts,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    info!("TCP DNS server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("TCP server received shutdown signal");
                break;
            }

            result = listener.accept() => {
                let (stream, src_addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept TCP connection: {}", e);
                        continue;
                    }
                };
                let handler = handler.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_tcp_connection(stream, src_addr, handler, timeouts).await {
                        warn!("TCP connection error from {}: {}", src_addr, e);
                    }
                });
            }
        }
    }

    Ok(())
}

/// Serve length-prefixed queries on one connection until the client closes
/// it or stays silent past the applicable timeout
async fn handle_tcp_connection(
    mut stream: TcpStream,
    src_addr: SocketAddr,
    handler: Arc<QueryHandler>,
    timeouts: TcpTimeouts,
) -> Result<()> {
    let mut wait = timeouts.read;

    loop {
        let mut len_buf = [0u8; 2];
        match timeout(wait, stream.read_exact(&mut len_buf)).await {
            Err(_) => {
                debug!("TCP connection from {} timed out waiting for a query", src_addr);
                return Ok(());
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }

        let len = u16::from_be_bytes(len_buf) as usize;
        let mut message = vec![0u8; len];
        timeout(timeouts.read, stream.read_exact(&mut message))
            .await
            .map_err(|_| DnsError::Timeout(format!("reading query from {}", src_addr)))??;

        wait = timeouts.idle;

        let Some(response) = handler.handle_tcp(&message) else {
            continue;
        };

        let mut framed = Vec::with_capacity(response.len() + 2);
        framed.extend_from_slice(&(response.len() as u16).to_be_bytes());
        framed.extend_from_slice(&response);
        timeout(timeouts.write, stream.write_all(&framed))
            .await
            .map_err(|_| DnsError::Timeout(format!("writing response to {}", src_addr)))??;
    }
}
