//! The resolver contract and resolver statistics.

use crate::dns::message::{Message, Question};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-request context passed down a resolver stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext {
    /// Address of the client that sent the request, when one exists. Requests
    /// originating inside the process leave this unset.
    pub source: Option<SocketAddr>,
}

impl ResolveContext {
    pub fn from_source(source: SocketAddr) -> Self {
        ResolveContext {
            source: Some(source),
        }
    }
}

/// A Resolver answers DNS questions.
///
/// Returning `None` means the resolver has no opinion and the question should
/// be treated as unanswerable; a message with a non-zero response code is
/// still an answer. Resolvers compose: any resolver may delegate to a nested
/// one, and implementations must be safe for concurrent use.
pub trait Resolver: Send + Sync {
    /// Creates a message in response to a question.
    ///
    /// `recursion_desired` indicates that the question should be resolved
    /// recursively.
    fn resolve(
        &self,
        ctx: &ResolveContext,
        question: &Question,
        recursion_desired: bool,
    ) -> impl Future<Output = Option<Message>> + Send;
}

/// Counts of DNS-related events observed by a resolver.
///
/// All counters increase monotonically and all methods are safe for
/// concurrent use.
#[derive(Debug, Default)]
pub struct Stats {
    questions: AtomicU64,
    rejected: AtomicU64,
    errors: AtomicU64,
    deferrals: AtomicU64,
    answers: AtomicU64,
}

impl Stats {
    /// Number of DNS questions received.
    pub fn questions(&self) -> u64 {
        self.questions.load(Ordering::Relaxed)
    }

    pub fn add_question(&self) {
        self.questions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of requests rejected.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn add_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of errors encountered.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of times a question was deferred to a nested resolver.
    pub fn deferrals(&self) -> u64 {
        self.deferrals.load(Ordering::Relaxed)
    }

    pub fn add_deferral(&self) {
        self.deferrals.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of DNS questions answered.
    pub fn answers(&self) -> u64 {
        self.answers.load(Ordering::Relaxed)
    }

    pub fn add_answer(&self) {
        self.answers.fetch_add(1, Ordering::Relaxed);
    }
}

/// An optional, cloneable handle to a [`Stats`] sink.
///
/// `add_*` calls on an empty handle are no-ops, so components can record
/// events unconditionally.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle(Option<Arc<Stats>>);

impl StatsHandle {
    pub fn new(stats: Arc<Stats>) -> Self {
        StatsHandle(Some(stats))
    }

    /// A handle that records nothing.
    pub fn none() -> Self {
        StatsHandle(None)
    }

    pub fn add_question(&self) {
        if let Some(stats) = &self.0 {
            stats.add_question();
        }
    }

    pub fn add_rejected(&self) {
        if let Some(stats) = &self.0 {
            stats.add_rejected();
        }
    }

    pub fn add_error(&self) {
        if let Some(stats) = &self.0 {
            stats.add_error();
        }
    }

    pub fn add_deferral(&self) {
        if let Some(stats) = &self.0 {
            stats.add_deferral();
        }
    }

    pub fn add_answer(&self) {
        if let Some(stats) = &self.0 {
            stats.add_answer();
        }
    }
}
