//! Simple resolvers for composing stacks and writing tests.

use crate::dns::message::{Header, Message, Question, Rcode};
use crate::dns::resolver::{ResolveContext, Resolver};
use std::collections::HashMap;

/// Builds an error response to a question.
pub fn error_response(question: &Question, rcode: Rcode, recursion_desired: bool) -> Message {
    Message {
        header: Header {
            response: true,
            rcode,
            recursion_desired,
            recursion_available: recursion_desired,
            ..Header::default()
        },
        questions: vec![question.clone()],
        ..Message::default()
    }
}

/// A catchall resolver which responds to all requests with an error.
pub struct ErroringResolver;

impl Resolver for ErroringResolver {
    async fn resolve(
        &self,
        _ctx: &ResolveContext,
        question: &Question,
        recursion_desired: bool,
    ) -> Option<Message> {
        Some(error_response(
            question,
            Rcode::NOT_IMPLEMENTED,
            recursion_desired,
        ))
    }
}

/// Serves answers from a static lookup table.
///
/// Questions the table cannot answer are delegated to the nested resolver.
/// Table keys are matched case-insensitively; names are folded to ASCII
/// lower case at construction and lookup time.
pub struct StaticResolver<N> {
    table: HashMap<Question, Message>,
    nested: N,
}

impl<N: Resolver> StaticResolver<N> {
    pub fn new(mapping: HashMap<Question, Message>, nested: N) -> Self {
        let table = mapping
            .into_iter()
            .map(|(mut question, message)| {
                question.name = question.name.to_ascii_lowercase();
                (question, message)
            })
            .collect();
        StaticResolver { table, nested }
    }
}

impl<N: Resolver> Resolver for StaticResolver<N> {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        question: &Question,
        recursion_desired: bool,
    ) -> Option<Message> {
        let mut key = question.clone();
        key.name = key.name.to_ascii_lowercase();

        let Some(entry) = self.table.get(&key) else {
            return self.nested.resolve(ctx, question, recursion_desired).await;
        };

        Some(Message {
            header: Header {
                response: true,
                authoritative: entry.header.authoritative,
                recursion_desired,
                recursion_available: entry.header.recursion_available,
                ..Header::default()
            },
            questions: vec![question.clone()],
            answers: entry.answers.clone(),
            authorities: entry.authorities.clone(),
            additionals: entry.additionals.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::message::{
        Name, RecordType, Resource, ResourceBody, ResourceHeader, CLASS_IN,
    };

    fn question(name: &str, rtype: RecordType) -> Question {
        Question {
            name: Name::new(name).unwrap(),
            rtype,
            class: CLASS_IN,
        }
    }

    fn a_response(owner: &str, ttl: u32, octets: [u8; 4]) -> Message {
        Message {
            answers: vec![Resource {
                header: ResourceHeader {
                    name: Name::new(owner).unwrap(),
                    rtype: RecordType::A,
                    class: CLASS_IN,
                    ttl,
                },
                body: ResourceBody::A(octets),
            }],
            ..Message::default()
        }
    }

    #[tokio::test]
    async fn test_erroring_resolver() {
        let q = question("foo.bar.", RecordType::A);
        let msg = ErroringResolver
            .resolve(&ResolveContext::default(), &q, true)
            .await
            .unwrap();
        assert!(msg.header.response);
        assert_eq!(msg.header.rcode, Rcode::NOT_IMPLEMENTED);
        assert!(msg.header.recursion_desired);
        assert!(msg.header.recursion_available);
        assert_eq!(msg.questions, vec![q]);
    }

    #[tokio::test]
    async fn test_static_resolver_serves_table() {
        let q = question("foo.bar.", RecordType::A);
        let mut mapping = HashMap::new();
        mapping.insert(q.clone(), a_response("foo.bar.", 10, [127, 1, 1, 1]));
        let resolver = StaticResolver::new(mapping, ErroringResolver);

        let msg = resolver
            .resolve(&ResolveContext::default(), &q, true)
            .await
            .unwrap();
        assert!(msg.header.response);
        assert_eq!(msg.header.rcode, Rcode::NO_ERROR);
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].body, ResourceBody::A([127, 1, 1, 1]));
    }

    #[tokio::test]
    async fn test_static_resolver_case_insensitive() {
        let mut mapping = HashMap::new();
        mapping.insert(
            question("Foo.BAR.", RecordType::A),
            a_response("foo.bar.", 10, [127, 1, 1, 1]),
        );
        let resolver = StaticResolver::new(mapping, ErroringResolver);

        let q = question("fOO.bar.", RecordType::A);
        let msg = resolver
            .resolve(&ResolveContext::default(), &q, true)
            .await
            .unwrap();
        assert_eq!(msg.header.rcode, Rcode::NO_ERROR);
        // The response carries the question as asked, not the table key.
        assert_eq!(msg.questions[0].name.as_str(), "fOO.bar.");
    }

    #[tokio::test]
    async fn test_static_resolver_delegates_misses() {
        let resolver = StaticResolver::new(HashMap::new(), ErroringResolver);
        let q = question("unknown.example.", RecordType::A);
        let msg = resolver
            .resolve(&ResolveContext::default(), &q, false)
            .await
            .unwrap();
        assert_eq!(msg.header.rcode, Rcode::NOT_IMPLEMENTED);
    }
}
