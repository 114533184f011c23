//! Forwarding resolver that queries upstream DNS servers over UDP.

use crate::dns::message::{Header, Message, Question};
use crate::dns::resolver::{ResolveContext, Resolver};
use crate::error::WireError;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

/// RFC 1035 limits plain UDP DNS messages to 512 bytes.
const UDP_RESPONSE_BUFFER: usize = 512;

/// Configuration for [`UpstreamResolver`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Timeout per upstream attempt.
    pub timeout: Duration,
    /// Extra passes over the upstream list after the first.
    pub max_retries: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            timeout: Duration::from_secs(2),
            max_retries: 1,
        }
    }
}

/// Failures of a single upstream exchange.
#[derive(Debug)]
enum QueryError {
    Io(io::Error),
    Timeout,
    /// Response arrived from an address other than the queried upstream
    UnexpectedSource(SocketAddr),
    /// Response ID does not match the query ID
    IdMismatch,
    /// Response packet could not be parsed
    Parse(WireError),
    /// Packet has the query bit set
    NotAResponse,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Io(e) => write!(f, "I/O error: {}", e),
            QueryError::Timeout => write!(f, "timed out"),
            QueryError::UnexpectedSource(from) => {
                write!(f, "response from unexpected source {}", from)
            }
            QueryError::IdMismatch => write!(f, "response ID mismatch"),
            QueryError::Parse(e) => write!(f, "parsing response: {}", e),
            QueryError::NotAResponse => write!(f, "packet is not a response"),
        }
    }
}

/// Resolves questions by forwarding them to upstream servers.
///
/// Upstreams are tried in order; the whole list is retried `max_retries`
/// additional times before giving up. Total failure yields `None` so an
/// outer resolver can treat the question as unanswerable.
pub struct UpstreamResolver {
    upstreams: Vec<SocketAddr>,
    config: UpstreamConfig,
}

impl UpstreamResolver {
    pub fn new(upstreams: Vec<SocketAddr>, config: UpstreamConfig) -> Self {
        UpstreamResolver { upstreams, config }
    }

    async fn query_one(
        &self,
        upstream: SocketAddr,
        packet: &[u8],
        id: u16,
    ) -> Result<Message, QueryError> {
        // Bind to the matching address family.
        let bind_addr = if upstream.is_ipv4() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };
        let socket = UdpSocket::bind(bind_addr).await.map_err(QueryError::Io)?;
        socket
            .send_to(packet, upstream)
            .await
            .map_err(QueryError::Io)?;

        let mut buf = vec![0u8; UDP_RESPONSE_BUFFER];
        let (len, from) = timeout(self.config.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| QueryError::Timeout)?
            .map_err(QueryError::Io)?;

        // Anti-spoofing: the response must come from the queried upstream
        // and echo our ID.
        if from != upstream {
            return Err(QueryError::UnexpectedSource(from));
        }
        let msg = Message::parse(&buf[..len]).map_err(QueryError::Parse)?;
        if !msg.header.response {
            return Err(QueryError::NotAResponse);
        }
        if msg.header.id != id {
            return Err(QueryError::IdMismatch);
        }
        Ok(msg)
    }
}

impl Resolver for UpstreamResolver {
    async fn resolve(
        &self,
        _ctx: &ResolveContext,
        question: &Question,
        recursion_desired: bool,
    ) -> Option<Message> {
        let id: u16 = rand::random();
        let request = Message {
            header: Header {
                id,
                recursion_desired,
                ..Header::default()
            },
            questions: vec![question.clone()],
            ..Message::default()
        };
        let packet = match request.pack() {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "packing upstream query");
                return None;
            }
        };

        for attempt in 0..=self.config.max_retries {
            for upstream in &self.upstreams {
                match self.query_one(*upstream, &packet, id).await {
                    Ok(msg) => {
                        debug!(
                            upstream = %upstream,
                            name = %question.name,
                            qtype = %question.rtype,
                            answers = msg.answers.len(),
                            "upstream answered"
                        );
                        return Some(msg);
                    }
                    Err(e) => {
                        warn!(
                            upstream = %upstream,
                            attempt = attempt,
                            error = %e,
                            "upstream query failed"
                        );
                    }
                }
            }
        }
        None
    }
}
