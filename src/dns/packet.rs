//! Packet-level DNS resolution: raw request bytes in, raw response bytes out.

use crate::dns::message::{Header, Message, Rcode};
use crate::dns::resolver::{ResolveContext, Resolver, StatsHandle};
use crate::error::ResolveError;

/// Configuration for [`PacketResolver`].
#[derive(Debug, Clone, Default)]
pub struct PacketResolverConfig {
    /// Optional statistics sink for rejected and errored requests.
    pub stats: StatsHandle,
}

/// Responds to binary DNS packet requests with binary DNS packet responses,
/// wrapping a message-level [`Resolver`].
pub struct PacketResolver<R> {
    resolver: R,
    stats: StatsHandle,
}

impl<R: Resolver> PacketResolver<R> {
    pub fn new(config: PacketResolverConfig, resolver: R) -> Self {
        PacketResolver {
            resolver,
            stats: config.stats,
        }
    }

    /// Creates a response packet for `packet` and appends it to `buf`,
    /// returning the buffer.
    ///
    /// When `max_packet_length` is non-zero, the appended packet is no more
    /// than `max_packet_length` bytes. Responses that do not fit are
    /// truncated to their header and question; if even that does not fit the
    /// call fails with [`ResolveError::TruncatedResponseTooBig`].
    pub async fn resolve_packet(
        &self,
        ctx: &ResolveContext,
        packet: &[u8],
        max_packet_length: usize,
        mut buf: Vec<u8>,
    ) -> Result<Vec<u8>, ResolveError> {
        let header = match Header::parse(packet) {
            Ok(header) => header,
            Err(e) => {
                self.stats.add_error();
                return Err(ResolveError::ParsingFailed(e));
            }
        };

        if header.response {
            self.stats.add_rejected();
            return Err(ResolveError::ResponseTypeRequest);
        }

        // A request whose body cannot be parsed gets a FORMERR answer rather
        // than an error: the sender is identifiable and deserves a reply.
        let request = match Message::parse(packet) {
            Ok(request) => request,
            Err(_) => return respond_error(&header, Rcode::FORMAT_ERROR, buf),
        };

        let question = match request.questions.as_slice() {
            [] => return respond_error(&header, Rcode::FORMAT_ERROR, buf),
            [question] => question,
            _ => {
                // Multi-question requests have no well defined response
                // semantics.
                self.stats.add_rejected();
                return respond_error(&header, Rcode::NOT_IMPLEMENTED, buf);
            }
        };

        let Some(mut response) = self
            .resolver
            .resolve(ctx, question, header.recursion_desired)
            .await
        else {
            return Err(ResolveError::NoResponse);
        };

        // Copy the request ID so the requester can match the response to its
        // request.
        response.header.id = header.id;

        let base = buf.len();
        if let Err(e) = response.append_pack(&mut buf) {
            buf.truncate(base);
            self.stats.add_error();
            return Err(ResolveError::PackingFailed(e));
        }
        if max_packet_length == 0 || buf.len() - base <= max_packet_length {
            return Ok(buf);
        }

        // The whole response is too big. Return a truncated packet.
        buf.truncate(base);
        response.header.truncated = true;
        response.answers.clear();
        response.authorities.clear();
        response.additionals.clear();

        if let Err(e) = response.append_pack(&mut buf) {
            buf.truncate(base);
            self.stats.add_error();
            return Err(ResolveError::PackingFailed(e));
        }
        if buf.len() - base > max_packet_length {
            buf.truncate(base);
            self.stats.add_error();
            return Err(ResolveError::TruncatedResponseTooBig);
        }
        Ok(buf)
    }
}

fn respond_error(
    header: &Header,
    rcode: Rcode,
    mut buf: Vec<u8>,
) -> Result<Vec<u8>, ResolveError> {
    let response = Message {
        header: Header {
            id: header.id,
            response: true,
            rcode,
            recursion_desired: header.recursion_desired,
            ..Header::default()
        },
        ..Message::default()
    };
    let base = buf.len();
    match response.append_pack(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) => {
            buf.truncate(base);
            Err(ResolveError::PackingFailed(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::message::{
        Name, Question, RecordType, Resource, ResourceBody, ResourceHeader, CLASS_IN,
    };
    use crate::dns::resolver::Stats;
    use std::sync::Arc;

    /// Returns a canned message, or nothing.
    struct FixedResolver {
        response: Option<Message>,
    }

    impl Resolver for FixedResolver {
        async fn resolve(
            &self,
            _ctx: &ResolveContext,
            _question: &Question,
            _recursion_desired: bool,
        ) -> Option<Message> {
            self.response.clone()
        }
    }

    fn question(name: &str) -> Question {
        Question {
            name: Name::new(name).unwrap(),
            rtype: RecordType::A,
            class: CLASS_IN,
        }
    }

    fn query_packet(name: &str, id: u16) -> Vec<u8> {
        Message {
            header: Header {
                id,
                recursion_desired: true,
                ..Header::default()
            },
            questions: vec![question(name)],
            ..Message::default()
        }
        .pack()
        .unwrap()
    }

    fn a_response(name: &str) -> Message {
        Message {
            header: Header {
                response: true,
                ..Header::default()
            },
            questions: vec![question(name)],
            answers: vec![Resource {
                header: ResourceHeader {
                    name: Name::new(name).unwrap(),
                    rtype: RecordType::A,
                    class: CLASS_IN,
                    ttl: 300,
                },
                body: ResourceBody::A([93, 184, 216, 34]),
            }],
            ..Message::default()
        }
    }

    fn txt_response(name: &str, strings: usize) -> Message {
        let mut msg = a_response(name);
        for i in 0..strings {
            msg.answers.push(Resource {
                header: ResourceHeader {
                    name: Name::new(name).unwrap(),
                    rtype: RecordType::TXT,
                    class: CLASS_IN,
                    ttl: 300,
                },
                body: ResourceBody::Txt(vec![format!("{}-{}", "x".repeat(200), i)]),
            });
        }
        msg
    }

    fn packet_resolver(response: Option<Message>) -> PacketResolver<FixedResolver> {
        PacketResolver::new(
            PacketResolverConfig::default(),
            FixedResolver { response },
        )
    }

    #[tokio::test]
    async fn test_resolve_packet_copies_id() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let packet = query_packet("example.com.", 0x5678);

        let out = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, Vec::new())
            .await
            .unwrap();
        let response = Message::parse(&out).unwrap();
        assert_eq!(response.header.id, 0x5678);
        assert!(response.header.response);
        assert_eq!(response.answers.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_packet_append_semantics() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let packet = query_packet("example.com.", 1);

        let out = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, vec![0xAA, 0xBB])
            .await
            .unwrap();
        assert_eq!(&out[..2], &[0xAA, 0xBB]);
        Message::parse(&out[2..]).unwrap();
    }

    #[tokio::test]
    async fn test_resolve_packet_rejects_response() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let mut packet = query_packet("example.com.", 1);
        packet[2] |= 0x80; // set the QR bit

        let err = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::ResponseTypeRequest);
    }

    #[tokio::test]
    async fn test_resolve_packet_short_packet() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let err = pr
            .resolve_packet(&ResolveContext::default(), &[0u8; 5], 512, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ParsingFailed(_)));
    }

    #[tokio::test]
    async fn test_resolve_packet_no_questions_formerr() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let packet = Message {
            header: Header {
                id: 0x0102,
                ..Header::default()
            },
            ..Message::default()
        }
        .pack()
        .unwrap();

        let out = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, Vec::new())
            .await
            .unwrap();
        let response = Message::parse(&out).unwrap();
        assert_eq!(response.header.id, 0x0102);
        assert_eq!(response.header.rcode, Rcode::FORMAT_ERROR);
        assert!(response.answers.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_packet_multiple_questions_notimp() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let packet = Message {
            header: Header::default(),
            questions: vec![question("a.example.com."), question("b.example.com.")],
            ..Message::default()
        }
        .pack()
        .unwrap();

        let out = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, Vec::new())
            .await
            .unwrap();
        let response = Message::parse(&out).unwrap();
        assert_eq!(response.header.rcode, Rcode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_resolve_packet_no_response() {
        let pr = packet_resolver(None);
        let packet = query_packet("example.com.", 1);

        let err = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NoResponse);
    }

    #[tokio::test]
    async fn test_resolve_packet_truncates_oversize() {
        // Far more TXT data than fits in a 512-byte datagram.
        let pr = packet_resolver(Some(txt_response("example.com.", 10)));
        let packet = query_packet("example.com.", 0x0A0B);

        let out = pr
            .resolve_packet(&ResolveContext::default(), &packet, 512, Vec::new())
            .await
            .unwrap();
        assert!(out.len() <= 512);

        let response = Message::parse(&out).unwrap();
        assert!(response.header.truncated);
        assert_eq!(response.header.id, 0x0A0B);
        assert!(response.answers.is_empty());
        assert!(response.authorities.is_empty());
        assert!(response.additionals.is_empty());
        // The question survives truncation.
        assert_eq!(response.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_packet_unbounded_when_zero() {
        let pr = packet_resolver(Some(txt_response("example.com.", 10)));
        let packet = query_packet("example.com.", 1);

        let out = pr
            .resolve_packet(&ResolveContext::default(), &packet, 0, Vec::new())
            .await
            .unwrap();
        assert!(out.len() > 512);
        assert!(!Message::parse(&out).unwrap().header.truncated);
    }

    #[tokio::test]
    async fn test_resolve_packet_truncated_still_too_big() {
        let pr = packet_resolver(Some(a_response("example.com.")));
        let packet = query_packet("example.com.", 1);

        let err = pr
            .resolve_packet(&ResolveContext::default(), &packet, 5, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::TruncatedResponseTooBig);
    }

    #[tokio::test]
    async fn test_resolve_packet_stats() {
        let stats = Arc::new(Stats::default());
        let pr = PacketResolver::new(
            PacketResolverConfig {
                stats: StatsHandle::new(Arc::clone(&stats)),
            },
            FixedResolver {
                response: Some(a_response("example.com.")),
            },
        );

        let mut response_packet = query_packet("example.com.", 1);
        response_packet[2] |= 0x80;
        let _ = pr
            .resolve_packet(&ResolveContext::default(), &response_packet, 512, Vec::new())
            .await;
        assert_eq!(stats.rejected(), 1);

        let _ = pr
            .resolve_packet(&ResolveContext::default(), &[0u8; 3], 512, Vec::new())
            .await;
        assert_eq!(stats.errors(), 1);
    }
}
