//! UDP and TCP DNS server drivers.

use crate::dns::packet::PacketResolver;
use crate::dns::resolver::{ResolveContext, Resolver};
use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default timeout for TCP DNS connections (RFC 1035 section 4.2.2).
const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Initial TCP read buffer size. 1280 bytes is a reasonable starting point
/// for IP over Ethernet (RFC 4035); the buffer grows as needed up to the
/// 16-bit framing limit.
const TCP_INITIAL_READ_BUFFER: usize = 1280;

/// RFC 1035 section 2.3.4 limits UDP DNS messages to 512 bytes.
const UDP_BUFFER_SIZE: usize = 512;

/// Client-facing timeout policy for TCP connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientTimeout {
    /// The RFC 1035 default of two minutes.
    #[default]
    Standard,
    /// Never time out idle clients.
    Disabled,
    /// Time out after the given duration.
    Custom(Duration),
}

impl ClientTimeout {
    fn as_duration(self) -> Option<Duration> {
        match self {
            ClientTimeout::Standard => Some(DEFAULT_TCP_TIMEOUT),
            ClientTimeout::Disabled => None,
            ClientTimeout::Custom(d) => Some(d),
        }
    }
}

/// Configuration for the TCP DNS server.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConfig {
    /// Timeout for communication with clients.
    pub client_timeout: ClientTimeout,
    /// Timeout for communication with the resolver. Enforced when set.
    pub resolver_timeout: Option<Duration>,
}

/// Configuration for the UDP DNS server.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConfig {
    /// Handle requests inline in the receive loop instead of spawning a task
    /// per packet. Useful for fast resolvers such as static tables, and as a
    /// lightweight way to rate-limit requests.
    pub disable_concurrency: bool,
    /// Timeout for communication with the resolver. Enforced when set.
    pub resolver_timeout: Option<Duration>,
}

/// Configuration for a [`Server`], including protocol specific options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConfig {
    pub tcp: TcpConfig,
    pub udp: UdpConfig,
}

/// A DNS server. It can be used with both TCP and UDP.
pub struct Server<R> {
    config: ServerConfig,
    packet: Arc<PacketResolver<R>>,
}

impl<R: Resolver + 'static> Server<R> {
    pub fn new(config: ServerConfig, packet: PacketResolver<R>) -> Self {
        Server {
            config,
            packet: Arc::new(packet),
        }
    }

    /// Listens for and responds to TCP DNS requests, one task per accepted
    /// connection.
    pub async fn serve_tcp(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (conn, peer) = listener.accept().await?;
            let packet = Arc::clone(&self.packet);
            let config = self.config.tcp;
            tokio::spawn(async move {
                debug!(client = %peer, "TCP DNS connection accepted");
                if let Err(e) = handle_tcp(&packet, config, conn, peer).await {
                    warn!(client = %peer, error = %e, "TCP DNS connection failed");
                }
            });
        }
    }

    /// Listens for and responds to UDP DNS requests.
    pub async fn serve_udp(&self, socket: UdpSocket) -> io::Result<()> {
        let socket = Arc::new(socket);
        let config = self.config.udp;
        let mut read_buf = vec![0u8; UDP_BUFFER_SIZE];
        // Reused response buffer for the non-concurrent mode.
        let mut write_buf = Vec::with_capacity(UDP_BUFFER_SIZE);

        loop {
            let (len, peer) = socket.recv_from(&mut read_buf).await?;

            if config.disable_concurrency {
                let mut buf = std::mem::take(&mut write_buf);
                buf.clear();
                write_buf =
                    match handle_udp(&self.packet, config, &socket, &read_buf[..len], peer, buf)
                        .await
                    {
                        Ok(buf) => buf,
                        Err(e) => {
                            warn!(client = %peer, error = %e, "UDP DNS request failed");
                            Vec::with_capacity(UDP_BUFFER_SIZE)
                        }
                    };
                continue;
            }

            let packet = Arc::clone(&self.packet);
            let socket = Arc::clone(&socket);
            let request = read_buf[..len].to_vec();
            tokio::spawn(async move {
                if let Err(e) =
                    handle_udp(&packet, config, &socket, &request, peer, Vec::new()).await
                {
                    warn!(client = %peer, error = %e, "UDP DNS request failed");
                }
            });
        }
    }
}

/// Responds to requests on one TCP connection until the client goes away or
/// an error occurs. Messages are framed with a 16-bit big-endian length
/// prefix.
async fn handle_tcp<R: Resolver>(
    packet: &PacketResolver<R>,
    config: TcpConfig,
    mut conn: TcpStream,
    peer: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ctx = ResolveContext::from_source(peer);
    let mut read_buf = BytesMut::new();
    read_buf.resize(TCP_INITIAL_READ_BUFFER, 0);

    loop {
        let mut len_buf = [0u8; 2];
        match client_io(config.client_timeout, conn.read_exact(&mut len_buf)).await {
            Ok(_) => {}
            // A client closing between requests is the normal end of the
            // connection, not an error.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(format!("reading request length: {}", e).into()),
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        if read_buf.len() < len {
            read_buf.resize(len, 0);
        }
        client_io(config.client_timeout, conn.read_exact(&mut read_buf[..len]))
            .await
            .map_err(|e| format!("reading request data: {}", e))?;

        // Leave room for the length prefix; the message length limit is
        // whatever fits the 16-bit frame.
        let mut response = resolve_with_timeout(
            packet,
            &ctx,
            &read_buf[..len],
            u16::MAX as usize,
            vec![0u8; 2],
            config.resolver_timeout,
        )
        .await?;
        let body_len = (response.len() - 2) as u16;
        response[..2].copy_from_slice(&body_len.to_be_bytes());

        client_io(config.client_timeout, conn.write_all(&response))
            .await
            .map_err(|e| format!("writing response: {}", e))?;
    }
}

/// Responds to a single UDP request, returning the response buffer for
/// reuse.
async fn handle_udp<R: Resolver>(
    packet: &PacketResolver<R>,
    config: UdpConfig,
    socket: &UdpSocket,
    request: &[u8],
    peer: SocketAddr,
    buf: Vec<u8>,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let ctx = ResolveContext::from_source(peer);
    let response = resolve_with_timeout(
        packet,
        &ctx,
        request,
        UDP_BUFFER_SIZE,
        buf,
        config.resolver_timeout,
    )
    .await?;
    socket.send_to(&response, peer).await?;
    Ok(response)
}

async fn resolve_with_timeout<R: Resolver>(
    packet: &PacketResolver<R>,
    ctx: &ResolveContext,
    request: &[u8],
    max_packet_length: usize,
    buf: Vec<u8>,
    resolver_timeout: Option<Duration>,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let fut = packet.resolve_packet(ctx, request, max_packet_length, buf);
    match resolver_timeout {
        Some(d) => Ok(timeout(d, fut).await.map_err(|_| "resolver timed out")??),
        None => Ok(fut.await?),
    }
}

async fn client_io<T>(
    client_timeout: ClientTimeout,
    fut: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    match client_timeout.as_duration() {
        Some(d) => timeout(d, fut)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "client timed out"))?,
        None => fut.await,
    }
}
