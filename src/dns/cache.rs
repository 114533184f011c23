//! Caching DNS resolver.
//!
//! The caching behavior of DNS resolvers is spread across several RFCs on
//! how resource record TTLs should be treated; the relevant ones here are
//! RFC 1034/1035, RFC 2181 sections 7 and 8, and RFC 2308 for negative
//! caching.
//!
//! The cache is case-sensitive: keys are compared byte for byte. A
//! normalizing resolver (see [`crate::dns::resolvers::StaticResolver`]) can
//! be layered in front when case folding is wanted.

use crate::dns::cache_list::LruList;
use crate::dns::message::{Message, Question, Rcode, RecordType, Resource, ResourceBody};
use crate::dns::resolver::{ResolveContext, Resolver, StatsHandle};
use crate::error::InvalidReorderingMode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Maximum time in seconds that records stay cached when the configuration
/// does not say otherwise.
pub const DEFAULT_MAX_TTL: u32 = 3600;

/// How answer records are reordered.
///
/// Reordering gives each record of a type an equal chance of appearing first
/// within the records of that type, for clients that only look at the first
/// answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReorderingMode {
    /// Answer records keep the positions the nested resolver produced.
    #[default]
    None,
    /// Answer records are randomized on every response.
    Random,
    /// Answer records are randomized when first cached and rotated by one on
    /// each cache hit.
    Rotation,
}

impl TryFrom<u8> for ReorderingMode {
    type Error = InvalidReorderingMode;

    fn try_from(value: u8) -> Result<Self, InvalidReorderingMode> {
        match value {
            0 => Ok(ReorderingMode::None),
            1 => Ok(ReorderingMode::Random),
            2 => Ok(ReorderingMode::Rotation),
            _ => Err(InvalidReorderingMode),
        }
    }
}

impl FromStr for ReorderingMode {
    type Err = InvalidReorderingMode;

    fn from_str(s: &str) -> Result<Self, InvalidReorderingMode> {
        match s {
            "none" => Ok(ReorderingMode::None),
            "random" => Ok(ReorderingMode::Random),
            "rotation" => Ok(ReorderingMode::Rotation),
            _ => Err(InvalidReorderingMode),
        }
    }
}

/// Source of the current time. Swappable for tests.
pub type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Configuration for [`CachingResolver`].
pub struct CacheConfig {
    pub reordering: ReorderingMode,

    /// Cache negative DNS responses in accordance with RFC 2308.
    pub enable_negative_caching: bool,

    /// Maximum time in seconds that records are cached. Zero selects
    /// [`DEFAULT_MAX_TTL`].
    ///
    /// RFC 2308 section 5: values of one to three hours have been found to
    /// work well; values exceeding one day have been found to be problematic.
    pub max_ttl: u32,

    /// Maximum number of responses to cache. Zero means unbounded.
    pub max_size: usize,

    /// Optional statistics sink.
    pub stats: StatsHandle,

    /// Source of the current time, for tests. Defaults to the system clock.
    pub clock: Option<Clock>,

    /// Random number source, for tests. Defaults to an entropy-seeded
    /// generator.
    pub rng: Option<StdRng>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            reordering: ReorderingMode::None,
            enable_negative_caching: false,
            max_ttl: DEFAULT_MAX_TTL,
            max_size: 0,
            stats: StatsHandle::none(),
            clock: None,
            rng: None,
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("reordering", &self.reordering)
            .field("enable_negative_caching", &self.enable_negative_caching)
            .field("max_ttl", &self.max_ttl)
            .field("max_size", &self.max_size)
            .field("custom_clock", &self.clock.is_some())
            .field("custom_rng", &self.rng.is_some())
            .finish()
    }
}

/// The cache key: the question paired with the recursion-desired flag, so a
/// non-recursive answer never satisfies a recursion-desired query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    question: Question,
    recursion_desired: bool,
}

/// A cache entry: the stored response plus its lifetime bookkeeping. Entries
/// live in the LRU arena; the key map points at their slots.
struct CacheEntry {
    key: CacheKey,
    msg: Message,
    negative: bool,
    expires: Instant,
    created: Instant,
}

/// Map, LRU list and RNG, all guarded by one lock.
struct CacheState {
    map: HashMap<CacheKey, usize>,
    list: LruList<CacheEntry>,
    rng: StdRng,
}

/// A resolver that caches successful responses from a nested resolver.
///
/// Safe for concurrent use. The internal lock is never held across the
/// nested resolver call.
pub struct CachingResolver<N> {
    reordering: ReorderingMode,
    enable_negative_caching: bool,
    max_ttl: u32,
    max_size: usize,
    stats: StatsHandle,
    clock: Clock,
    state: Mutex<CacheState>,
    nested: N,
}

impl<N: Resolver> CachingResolver<N> {
    /// Creates a resolver that caches responses from `nested`.
    pub fn new(config: CacheConfig, nested: N) -> Self {
        let max_ttl = if config.max_ttl == 0 {
            DEFAULT_MAX_TTL
        } else {
            config.max_ttl
        };
        let clock: Clock = config.clock.unwrap_or_else(|| Arc::new(Instant::now));
        let rng = config.rng.unwrap_or_else(StdRng::from_entropy);
        CachingResolver {
            reordering: config.reordering,
            enable_negative_caching: config.enable_negative_caching,
            max_ttl,
            max_size: config.max_size,
            stats: config.stats,
            clock,
            state: Mutex::new(CacheState {
                map: HashMap::new(),
                list: LruList::new(),
                rng,
            }),
            nested,
        }
    }

    fn now(&self) -> Instant {
        (self.clock)()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks the cache for a matching entry. On a hit the entry moves to
    /// the LRU front and the returned copy has its TTLs aged by the time the
    /// entry spent in the cache.
    fn lookup(&self, question: &Question, recursion_desired: bool) -> Option<Message> {
        let key = CacheKey {
            question: question.clone(),
            recursion_desired,
        };

        let mut guard = self.lock_state();
        let CacheState { map, list, rng } = &mut *guard;
        let &slot = map.get(&key)?;
        let now = self.now();

        {
            let Some(entry) = list.get(slot) else {
                map.remove(&key);
                return None;
            };
            // Negative entries are only checked against the gate here for
            // symmetry with the store path; the store path is the only
            // insertion site.
            if now > entry.expires || (entry.negative && !self.enable_negative_caching) {
                map.remove(&key);
                list.remove(slot);
                return None;
            }
        }

        list.move_to_front(slot);
        let entry = list.get_mut(slot)?;
        let elapsed = now.duration_since(entry.created);
        let negative = entry.negative;

        if self.reordering == ReorderingMode::Rotation {
            // Rotating the cached records in place is safe: the lock is held
            // and the copy below snapshots the rotated state.
            reorder_answers(&mut entry.msg.answers, rotate_records, rng);
        }

        // Copy the sections before adjusting them; the cached entry must not
        // be visible to callers.
        let mut msg = Message {
            header: entry.msg.header,
            questions: vec![question.clone()],
            answers: entry.msg.answers.clone(),
            authorities: entry.msg.authorities.clone(),
            additionals: entry.msg.additionals.clone(),
        };

        if self.reordering == ReorderingMode::Random {
            reorder_answers(&mut msg.answers, shuffle_records, rng);
        }
        drop(guard);

        adjust_ttl(&mut msg.answers, elapsed, false);
        adjust_ttl(&mut msg.authorities, elapsed, negative);
        adjust_ttl(&mut msg.additionals, elapsed, false);
        Some(msg)
    }

    /// Stores an entry, replacing any entry already cached for the key and
    /// evicting the least recently used entry when the cache is over its
    /// size bound.
    fn store(&self, key: CacheKey, msg: &Message, ttl: u32, negative: bool) {
        // Copy the sections so a later in-place rotation can never alias a
        // message the caller still holds.
        let msg = Message {
            header: msg.header,
            questions: msg.questions.clone(),
            answers: msg.answers.clone(),
            authorities: msg.authorities.clone(),
            additionals: msg.additionals.clone(),
        };

        let mut guard = self.lock_state();
        let CacheState { map, list, .. } = &mut *guard;
        let now = self.now();
        let slot = list.push_front(CacheEntry {
            key: key.clone(),
            msg,
            negative,
            expires: now + Duration::from_secs(u64::from(ttl)),
            created: now,
        });
        if let Some(old) = map.insert(key, slot) {
            list.remove(old);
        }
        debug_assert_eq!(map.len(), list.len());

        if self.max_size > 0 && map.len() > self.max_size {
            if let Some(tail) = list.back() {
                if let Some(evicted) = list.remove(tail) {
                    map.remove(&evicted.key);
                }
            }
        }
    }

    /// Stores a positive response. Responses with no resources, or with any
    /// zero TTL among them, are not cached.
    fn put_positive(&self, key: CacheKey, msg: &Message) {
        if msg.answers.is_empty() && msg.authorities.is_empty() && msg.additionals.is_empty() {
            return;
        }

        let mut ttl = min_ttl(&msg.answers, u32::MAX);
        ttl = min_ttl(&msg.authorities, ttl);
        ttl = min_ttl(&msg.additionals, ttl);
        if ttl == 0 {
            return;
        }

        self.store(key, msg, ttl.min(self.max_ttl), false);
    }

    /// Stores a negative response.
    ///
    /// RFC 2308 section 3: the negative TTL is the minimum of the SOA
    /// MINIMUM field and the TTL of the SOA itself. Responses without an SOA
    /// in the authority section, or with a zero negative TTL, are not cached
    /// (RFC 2308 section 5).
    fn put_negative(&self, key: CacheKey, msg: &Message) {
        let mut ttl = 0;
        for rr in &msg.authorities {
            if let ResourceBody::Soa { min_ttl, .. } = rr.body {
                ttl = rr.header.ttl.min(min_ttl);
                break;
            }
        }
        if ttl == 0 {
            return;
        }

        self.store(key, msg, ttl.min(self.max_ttl), true);
    }

    /// Shuffles the answer section of a freshly resolved response.
    fn shuffle_response(&self, msg: &mut Message) {
        let mut guard = self.lock_state();
        reorder_answers(&mut msg.answers, shuffle_records, &mut guard.rng);
    }
}

impl<N: Resolver> Resolver for CachingResolver<N> {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        question: &Question,
        recursion_desired: bool,
    ) -> Option<Message> {
        self.stats.add_question();

        if let Some(msg) = self.lookup(question, recursion_desired) {
            self.stats.add_answer();
            return Some(msg);
        }

        let resolved = self.nested.resolve(ctx, question, recursion_desired).await;
        self.stats.add_deferral();
        let mut msg = resolved?;

        if self.reordering != ReorderingMode::None {
            // The shuffle mutates the message the caller sees; the cached
            // copy is taken afterwards, so both start from the same order.
            self.shuffle_response(&mut msg);
        }

        let key = CacheKey {
            question: question.clone(),
            recursion_desired,
        };
        if self.enable_negative_caching && is_cacheable_negative(question, &msg) {
            self.put_negative(key, &msg);
        } else if msg.header.rcode == Rcode::NO_ERROR {
            self.put_positive(key, &msg);
        }

        Some(msg)
    }
}

/// Minimum of `prev` and the TTLs of each resource.
fn min_ttl(rs: &[Resource], prev: u32) -> u32 {
    rs.iter().fold(prev, |min, r| min.min(r.header.ttl))
}

/// Deducts `elapsed` from the TTL of each resource, clamping at zero.
/// Sub-second remainders truncate, so a record within its last second is
/// returned with a zero TTL and downstream caches will not keep it.
fn adjust_ttl(rs: &mut [Resource], elapsed: Duration, negative: bool) {
    for r in rs {
        let mut ttl_sec = r.header.ttl;

        // RFC 2308 section 5: the SOA record of a negative entry takes its
        // effective TTL from the minimum of the SOA MINIMUM field and the
        // SOA's own TTL, then decrements like a normal cached answer.
        if negative {
            if let ResourceBody::Soa { min_ttl, .. } = r.body {
                ttl_sec = ttl_sec.min(min_ttl);
            }
        }

        let remaining = Duration::from_secs(u64::from(ttl_sec)).saturating_sub(elapsed);
        r.header.ttl = remaining.as_secs() as u32;
    }
}

/// Reports whether a response is a cacheable negative response per RFC 2308
/// section 2: NXDOMAIN, or NODATA (success without an answer of the asked
/// type).
fn is_cacheable_negative(question: &Question, msg: &Message) -> bool {
    match msg.header.rcode {
        Rcode::NO_ERROR => msg
            .answers
            .iter()
            .all(|rr| rr.header.rtype != question.rtype),
        Rcode::NAME_ERROR => true,
        _ => false,
    }
}

type ReorderFn = fn(&mut [Resource], &[usize], &mut StdRng);

/// Shuffles the records at the given positions.
fn shuffle_records(rr: &mut [Resource], pos: &[usize], rng: &mut StdRng) {
    if pos.len() <= 1 {
        return;
    }
    for i in (1..pos.len()).rev() {
        let j = rng.gen_range(0..=i);
        rr.swap(pos[i], pos[j]);
    }
}

/// Left-rotates the records at the given positions by one.
fn rotate_records(rr: &mut [Resource], pos: &[usize], _rng: &mut StdRng) {
    if pos.len() <= 1 {
        return;
    }
    for i in 0..pos.len() - 1 {
        rr.swap(pos[i], pos[i + 1]);
    }
}

/// Reorders the A, AAAA, MX and NS records within the answer section using
/// `f`. Records only trade places with records of the same type; everything
/// else keeps its position.
fn reorder_answers(answers: &mut [Resource], f: ReorderFn, rng: &mut StdRng) {
    if answers.len() <= 1 {
        return;
    }
    let mut type_a = Vec::new();
    let mut type_aaaa = Vec::new();
    let mut type_mx = Vec::new();
    let mut type_ns = Vec::new();
    for (i, r) in answers.iter().enumerate() {
        match r.header.rtype {
            RecordType::A => type_a.push(i),
            RecordType::AAAA => type_aaaa.push(i),
            RecordType::MX => type_mx.push(i),
            RecordType::NS => type_ns.push(i),
            _ => {}
        }
    }
    f(answers, &type_a, rng);
    f(answers, &type_aaaa, rng);
    f(answers, &type_mx, rng);
    f(answers, &type_ns, rng);
}
