//! Scripted in-memory transport for tests.

use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode};
use hickory_proto::rr::rdata::{A, CNAME};
use hickory_proto::rr::{Name, RData, Record};
use rustc_hash::FxHashMap;

use super::Exchange;

/// What the scripted resolver does with one exchange.
pub(crate) enum Reply {
    Answer(Message),
    Fail(io::ErrorKind),
    /// Never answer; the caller's timeout or cancellation must end it.
    Hang,
}

type Script = dyn Fn(&Message, &str, usize) -> Reply + Send + Sync;

/// Transport whose replies come from a closure of
/// `(request, server, attempt number for that server)`.
pub(crate) struct MockExchange {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    per_server: Mutex<FxHashMap<String, usize>>,
}

impl MockExchange {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(&Message, &str, usize) -> Reply + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            per_server: Mutex::new(FxHashMap::default()),
        }
    }

    /// Every query is redirected to `target`.
    pub(crate) fn blocking(target: &'static str) -> Self {
        Self::new(move |req, _, _| Reply::Answer(cname_answer(req, target)))
    }

    /// Every query gets a plain A answer.
    pub(crate) fn clear() -> Self {
        Self::new(|req, _, _| Reply::Answer(a_answer(req)))
    }

    /// Every exchange is refused.
    pub(crate) fn unreachable() -> Self {
        Self::new(|_, _, _| Reply::Fail(io::ErrorKind::ConnectionRefused))
    }

    /// Hold each exchange open for `delay` before replying.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_to(&self, server: &str) -> usize {
        self.per_server
            .lock()
            .unwrap()
            .get(server)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for MockExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockExchange")
            .field("calls", &self.calls())
            .field("peak_in_flight", &self.peak_in_flight())
            .finish()
    }
}

/// Decrements the in-flight gauge even when the exchange future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn exchange(&self, request: &Message, server: &str) -> io::Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut per_server = self.per_server.lock().unwrap();
            let count = per_server.entry(server.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match (self.script)(request, server, attempt) {
            Reply::Answer(response) => Ok(response),
            Reply::Fail(kind) => Err(io::Error::new(kind, format!("scripted failure for {server}"))),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// A NOERROR response echoing the request's question, with no records.
pub(crate) fn empty_answer(request: &Message) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.add_queries(request.queries().iter().cloned());
    response
}

pub(crate) fn a_answer(request: &Message) -> Message {
    let mut response = empty_answer(request);
    response.add_answer(Record::from_rdata(
        question_name(request),
        60,
        RData::A(A::from(Ipv4Addr::new(93, 184, 216, 34))),
    ));
    response
}

pub(crate) fn cname_answer(request: &Message, target: &str) -> Message {
    let mut response = empty_answer(request);
    let target = Name::from_ascii(target).unwrap_or_else(|_| Name::root());
    response.add_answer(Record::from_rdata(
        question_name(request),
        60,
        RData::CNAME(CNAME(target)),
    ));
    response
}

fn question_name(request: &Message) -> Name {
    request
        .queries()
        .first()
        .map(|q| q.name().clone())
        .unwrap_or_else(Name::root)
}
